//! Binary wire/on-disk format for [`Program`] (§6): a small header
//! followed by a tagged instruction stream, modeled on the magic +
//! version + `Cursor` idiom `luars` uses for its own bytecode chunks,
//! with the same string-table deduplication trick applied to repeated
//! property/builtin names and, at the instruction level, to whole
//! repeated [`Operation`]s.
//!
//! A serialized program is not byte-identical to the `Program` it came
//! from: [`crate::types::LuaType`] extensions (object shape, signatures
//! attached to table methods aside from the signature's bare arity) are
//! dropped, since they are reconstructible by the type analyzer and are
//! not needed to replay or mutate the program. What round-trips exactly
//! is the instruction stream, variable numbering/locality, and program
//! identity/provenance.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::rc::Rc;

use ahash::AHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::code::Code;
use crate::instruction::operators::{BinaryOperator, CompareOperator, UnaryOperator};
use crate::instruction::{Inouts, Instruction, Operation};
use crate::program::{Program, ProgramId};
use crate::types::{LuaType, Parameter, Signature, SignatureError, TypeSet};
use crate::variable::{Variable, VariableLocality};

const MAGIC: &[u8; 5] = b"\x00FZIL";
const VERSION: u8 = 1;

/// Sentinel operation tag meaning "see the operation cache" rather than
/// a real opcode; `operation_tag` never returns this value.
const OP_CACHE_REF: u16 = 0xFFFF;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("not a fuzzilu program file")]
    BadMagic,
    #[error("unsupported program format version {0}")]
    UnsupportedVersion(u8),
    #[error("unexpected end of input while reading {0}")]
    Truncated(&'static str),
    #[error("invalid variable locality tag {0}")]
    InvalidLocality(u8),
    #[error("invalid operation tag {0}")]
    InvalidOperationTag(u16),
    #[error("operation cache reference {0} out of range")]
    InvalidCacheRef(u32),
    #[error("string reference {0} out of range")]
    InvalidStringRef(u32),
    #[error("invalid parameter tag {0}")]
    InvalidParameterTag(u8),
    #[error("invalid operator tag {0}")]
    InvalidOperatorTag(u8),
    #[error("invalid utf-8 in serialized string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid signature: {0}")]
    Signature(#[from] SignatureError),
}

type Result<T> = std::result::Result<T, SerializeError>;

/// Serialize a [`Program`] to the `.fzil` binary format.
pub fn serialize_program(program: &Program) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);

    let mut w = Writer {
        buf: &mut buf,
        strings: HashMap::new(),
        op_cache: Vec::new(),
    };

    write_u64(w.buf, program.id().as_u64());
    match program.parent() {
        Some(parent) => {
            w.buf.push(1);
            write_u64(w.buf, parent.as_u64());
        }
        None => w.buf.push(0),
    }

    write_u32(w.buf, program.contributors().len() as u32);
    for contributor in program.contributors() {
        write_string(&mut w, contributor);
    }

    let comments: Vec<(usize, &str)> = program.comments().collect();
    write_u32(w.buf, comments.len() as u32);
    for (position, text) in comments {
        write_u32(w.buf, position as u32);
        write_string(&mut w, text);
    }

    let code = program.code();
    write_u32(w.buf, code.len() as u32);
    for instruction in code.iter() {
        write_instruction(&mut w, instruction);
    }

    buf
}

/// Deserialize a [`Program`] previously written by [`serialize_program`].
pub fn deserialize_program(data: &[u8]) -> Result<Program> {
    let mut cursor = Cursor::new(data);

    let mut magic = [0u8; 5];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| SerializeError::Truncated("magic"))?;
    if &magic != MAGIC {
        return Err(SerializeError::BadMagic);
    }

    let version = read_u8(&mut cursor)?;
    if version != VERSION {
        return Err(SerializeError::UnsupportedVersion(version));
    }

    let mut r = Reader {
        cursor: &mut cursor,
        strings: Vec::new(),
        op_cache: Vec::new(),
    };

    let id = ProgramId::from_u64(read_u64(r.cursor)?);
    let parent = match read_u8(r.cursor)? {
        0 => None,
        _ => Some(ProgramId::from_u64(read_u64(r.cursor)?)),
    };

    let num_contributors = read_u32(r.cursor)? as usize;
    let mut contributors = Vec::with_capacity(num_contributors);
    for _ in 0..num_contributors {
        contributors.push(Rc::from(read_string(&mut r)?.as_str()));
    }

    let num_comments = read_u32(r.cursor)? as usize;
    let mut comments = AHashMap::with_capacity(num_comments);
    for _ in 0..num_comments {
        let position = read_u32(r.cursor)? as usize;
        let text = read_string(&mut r)?;
        comments.insert(position, text);
    }

    let num_instructions = read_u32(r.cursor)? as usize;
    let mut code = Code::new();
    for _ in 0..num_instructions {
        code.push(read_instruction(&mut r)?);
    }

    Ok(Program::from_parts(id, code, parent, comments.into_iter().collect(), contributors))
}

struct Writer<'a> {
    buf: &'a mut Vec<u8>,
    /// Mirrors `luars`'s chunk-serializer string table: first occurrence
    /// writes the bytes and records an index; later occurrences write a
    /// zero-length marker followed by that index.
    strings: HashMap<String, u32>,
    /// Previously written operations, in write order; a later identical
    /// operation is replaced by a reference into this list.
    op_cache: Vec<Operation>,
}

struct Reader<'c, 'd> {
    cursor: &'c mut Cursor<&'d [u8]>,
    strings: Vec<String>,
    op_cache: Vec<Operation>,
}

fn write_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

fn write_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_raw_string(buf: &mut Vec<u8>, s: &str) {
    write_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn write_string(w: &mut Writer, s: &str) {
    if let Some(&index) = w.strings.get(s) {
        write_u32(w.buf, 0);
        write_u32(w.buf, index);
        return;
    }
    let index = w.strings.len() as u32 + 1;
    w.strings.insert(s.to_string(), index);
    if s.is_empty() {
        write_u32(w.buf, 0);
        write_u32(w.buf, 0);
    } else {
        write_raw_string(w.buf, s);
    }
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8> {
    let mut b = [0u8; 1];
    cursor.read_exact(&mut b).map_err(|_| SerializeError::Truncated("u8"))?;
    Ok(b[0])
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16> {
    let mut b = [0u8; 2];
    cursor.read_exact(&mut b).map_err(|_| SerializeError::Truncated("u16"))?;
    Ok(u16::from_le_bytes(b))
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    let mut b = [0u8; 4];
    cursor.read_exact(&mut b).map_err(|_| SerializeError::Truncated("u32"))?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64> {
    let mut b = [0u8; 8];
    cursor.read_exact(&mut b).map_err(|_| SerializeError::Truncated("u64"))?;
    Ok(u64::from_le_bytes(b))
}

fn read_i64(cursor: &mut Cursor<&[u8]>) -> Result<i64> {
    let mut b = [0u8; 8];
    cursor.read_exact(&mut b).map_err(|_| SerializeError::Truncated("i64"))?;
    Ok(i64::from_le_bytes(b))
}

fn read_f64(cursor: &mut Cursor<&[u8]>) -> Result<f64> {
    let mut b = [0u8; 8];
    cursor.read_exact(&mut b).map_err(|_| SerializeError::Truncated("f64"))?;
    Ok(f64::from_le_bytes(b))
}

fn read_raw_string(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(|_| SerializeError::Truncated("string"))?;
    Ok(String::from_utf8(buf)?)
}

fn read_string(r: &mut Reader) -> Result<String> {
    let len = read_u32(r.cursor)? as usize;
    if len == 0 {
        let index = read_u32(r.cursor)?;
        if index == 0 {
            let s = String::new();
            r.strings.push(s.clone());
            return Ok(s);
        }
        let s = r
            .strings
            .get(index as usize - 1)
            .cloned()
            .ok_or(SerializeError::InvalidStringRef(index))?;
        return Ok(s);
    }
    let s = read_raw_string(r.cursor, len)?;
    r.strings.push(s.clone());
    Ok(s)
}

fn write_variable(buf: &mut Vec<u8>, v: Variable) {
    write_u32(buf, v.number());
    write_u8(
        buf,
        match v.locality() {
            VariableLocality::ScopedToBlock => 0,
            VariableLocality::ModuleGlobal => 1,
        },
    );
}

fn read_variable(cursor: &mut Cursor<&[u8]>) -> Result<Variable> {
    let number = read_u32(cursor)?;
    let locality = match read_u8(cursor)? {
        0 => VariableLocality::ScopedToBlock,
        1 => VariableLocality::ModuleGlobal,
        tag => return Err(SerializeError::InvalidLocality(tag)),
    };
    Ok(Variable::new(number, locality))
}

fn write_lua_type(buf: &mut Vec<u8>, ty: &LuaType) {
    write_u16(buf, ty.definite().bits());
    write_u16(buf, ty.possible().bits());
}

fn read_lua_type(cursor: &mut Cursor<&[u8]>) -> Result<LuaType> {
    let definite = TypeSet::from_bits_truncate(read_u16(cursor)?);
    let possible = TypeSet::from_bits_truncate(read_u16(cursor)?);
    Ok(LuaType::from_parts(definite, possible))
}

fn write_signature(buf: &mut Vec<u8>, sig: &Signature) {
    write_u32(buf, sig.parameters().len() as u32);
    for param in sig.parameters() {
        match param {
            Parameter::Plain(t) => {
                write_u8(buf, 0);
                write_lua_type(buf, t);
            }
            Parameter::Optional(t) => {
                write_u8(buf, 1);
                write_lua_type(buf, t);
            }
            Parameter::Rest(t) => {
                write_u8(buf, 2);
                write_lua_type(buf, t);
            }
        }
    }
    write_u32(buf, sig.returns().len() as u32);
    for ret in sig.returns() {
        write_lua_type(buf, ret);
    }
}

fn read_signature(cursor: &mut Cursor<&[u8]>) -> Result<Signature> {
    let num_params = read_u32(cursor)? as usize;
    let mut parameters = Vec::with_capacity(num_params);
    for _ in 0..num_params {
        let tag = read_u8(cursor)?;
        let ty = read_lua_type(cursor)?;
        parameters.push(match tag {
            0 => Parameter::Plain(ty),
            1 => Parameter::Optional(ty),
            2 => Parameter::Rest(ty),
            tag => return Err(SerializeError::InvalidParameterTag(tag)),
        });
    }
    let num_returns = read_u32(cursor)? as usize;
    let mut returns = Vec::with_capacity(num_returns);
    for _ in 0..num_returns {
        returns.push(read_lua_type(cursor)?);
    }
    Ok(Signature::new(parameters, returns)?)
}

fn unary_tag(op: UnaryOperator) -> u8 {
    UnaryOperator::ALL.iter().position(|&o| o == op).expect("exhaustive") as u8
}

fn unary_from_tag(tag: u8) -> Result<UnaryOperator> {
    UnaryOperator::ALL
        .get(tag as usize)
        .copied()
        .ok_or(SerializeError::InvalidOperatorTag(tag))
}

fn binary_tag(op: BinaryOperator) -> u8 {
    BinaryOperator::ALL.iter().position(|&o| o == op).expect("exhaustive") as u8
}

fn binary_from_tag(tag: u8) -> Result<BinaryOperator> {
    BinaryOperator::ALL
        .get(tag as usize)
        .copied()
        .ok_or(SerializeError::InvalidOperatorTag(tag))
}

fn compare_tag(op: CompareOperator) -> u8 {
    CompareOperator::ALL.iter().position(|&o| o == op).expect("exhaustive") as u8
}

fn compare_from_tag(tag: u8) -> Result<CompareOperator> {
    CompareOperator::ALL
        .get(tag as usize)
        .copied()
        .ok_or(SerializeError::InvalidOperatorTag(tag))
}

/// Opcode tag for a given operation kind, independent of its payload.
/// Order matches declaration order in `Operation`; stable within one
/// format `VERSION`, not guaranteed across versions.
fn operation_tag(op: &Operation) -> u16 {
    match op {
        Operation::LoadInteger(_) => 0,
        Operation::LoadFloat(_) => 1,
        Operation::LoadString(_) => 2,
        Operation::LoadBoolean(_) => 3,
        Operation::LoadNil => 4,
        Operation::LoadUndefined => 5,
        Operation::LoadBuiltin(_) => 6,
        Operation::LoadPair => 7,
        Operation::Unary(_) => 8,
        Operation::Binary(_) => 9,
        Operation::Compare(_) => 10,
        Operation::Update(_) => 11,
        Operation::Reassign => 12,
        Operation::BeginTable => 13,
        Operation::EndTable => 14,
        Operation::TableAddProperty { .. } => 15,
        Operation::TableAddElement => 16,
        Operation::BeginTableMethod { .. } => 17,
        Operation::EndTableMethod => 18,
        Operation::CreateArray { .. } => 19,
        Operation::GetProperty { .. } => 20,
        Operation::SetProperty { .. } => 21,
        Operation::UpdateProperty { .. } => 22,
        Operation::DeleteProperty { .. } => 23,
        Operation::GetElement => 24,
        Operation::SetElement => 25,
        Operation::UpdateElement { .. } => 26,
        Operation::DeleteElement => 27,
        Operation::BeginIf { .. } => 28,
        Operation::BeginElse => 29,
        Operation::EndIf => 30,
        Operation::BeginWhileHeader => 31,
        Operation::BeginWhileBody => 32,
        Operation::EndWhile => 33,
        Operation::BeginForInitializer => 34,
        Operation::BeginForCondition => 35,
        Operation::BeginForAfterthought => 36,
        Operation::BeginForBody => 37,
        Operation::EndFor => 38,
        Operation::BeginForIn { .. } => 39,
        Operation::EndForIn => 40,
        Operation::BeginRepeat { .. } => 41,
        Operation::EndRepeat => 42,
        Operation::LoopBreak => 43,
        Operation::Label => 44,
        Operation::Goto => 45,
        Operation::BeginFunction { .. } => 46,
        Operation::EndFunction => 47,
        Operation::Return => 48,
        Operation::CallFunction { .. } => 49,
        Operation::CallMethod { .. } => 50,
        Operation::Nop => 51,
    }
}

fn write_operation_payload(w: &mut Writer, op: &Operation) {
    match op {
        Operation::LoadInteger(n) => write_i64(w.buf, *n),
        Operation::LoadFloat(f) => write_f64(w.buf, *f),
        Operation::LoadString(s) => write_string(w, s),
        Operation::LoadBoolean(b) => write_u8(w.buf, *b as u8),
        Operation::LoadNil | Operation::LoadUndefined | Operation::LoadPair => {}
        Operation::LoadBuiltin(name) => write_string(w, name),
        Operation::Unary(op) => write_u8(w.buf, unary_tag(*op)),
        Operation::Binary(op) | Operation::Update(op) => write_u8(w.buf, binary_tag(*op)),
        Operation::Compare(op) => write_u8(w.buf, compare_tag(*op)),
        Operation::Reassign
        | Operation::BeginTable
        | Operation::EndTable
        | Operation::TableAddElement
        | Operation::EndTableMethod
        | Operation::GetElement
        | Operation::SetElement
        | Operation::DeleteElement
        | Operation::BeginElse
        | Operation::EndIf
        | Operation::BeginWhileHeader
        | Operation::EndWhile
        | Operation::BeginForInitializer
        | Operation::BeginForCondition
        | Operation::BeginForAfterthought
        | Operation::BeginForBody
        | Operation::EndFor
        | Operation::EndForIn
        | Operation::EndRepeat
        | Operation::LoopBreak
        | Operation::Label
        | Operation::Goto
        | Operation::EndFunction
        | Operation::Return
        | Operation::Nop => {}
        Operation::TableAddProperty { name } => write_string(w, name),
        Operation::BeginTableMethod { name, signature } => {
            write_string(w, name);
            write_signature(w.buf, signature);
        }
        Operation::CreateArray { first_variadic_input } => write_u32(w.buf, *first_variadic_input as u32),
        Operation::GetProperty { name } | Operation::SetProperty { name } | Operation::DeleteProperty { name } => {
            write_string(w, name)
        }
        Operation::UpdateProperty { name, op } => {
            write_string(w, name);
            write_u8(w.buf, binary_tag(*op));
        }
        Operation::UpdateElement { op } => write_u8(w.buf, binary_tag(*op)),
        Operation::BeginIf { inverted } => write_u8(w.buf, *inverted as u8),
        Operation::BeginForIn { num_loop_variables } => write_u32(w.buf, *num_loop_variables as u32),
        Operation::BeginRepeat { has_counter } => write_u8(w.buf, *has_counter as u8),
        Operation::BeginFunction { signature, is_method } => {
            write_signature(w.buf, signature);
            write_u8(w.buf, *is_method as u8);
        }
        Operation::CallFunction { first_variadic_input } => write_u32(w.buf, *first_variadic_input as u32),
        Operation::CallMethod { name, first_variadic_input } => {
            write_string(w, name);
            write_u32(w.buf, *first_variadic_input as u32);
        }
    }
}

fn read_operation_payload(r: &mut Reader, tag: u16) -> Result<Operation> {
    Ok(match tag {
        0 => Operation::LoadInteger(read_i64(r.cursor)?),
        1 => Operation::LoadFloat(read_f64(r.cursor)?),
        2 => Operation::LoadString(SmolStr::new(read_string(r)?)),
        3 => Operation::LoadBoolean(read_u8(r.cursor)? != 0),
        4 => Operation::LoadNil,
        5 => Operation::LoadUndefined,
        6 => Operation::LoadBuiltin(SmolStr::new(read_string(r)?)),
        7 => Operation::LoadPair,
        8 => Operation::Unary(unary_from_tag(read_u8(r.cursor)?)?),
        9 => Operation::Binary(binary_from_tag(read_u8(r.cursor)?)?),
        10 => Operation::Compare(compare_from_tag(read_u8(r.cursor)?)?),
        11 => Operation::Update(binary_from_tag(read_u8(r.cursor)?)?),
        12 => Operation::Reassign,
        13 => Operation::BeginTable,
        14 => Operation::EndTable,
        15 => Operation::TableAddProperty { name: SmolStr::new(read_string(r)?) },
        16 => Operation::TableAddElement,
        17 => {
            let name = SmolStr::new(read_string(r)?);
            let signature = Rc::new(read_signature(r.cursor)?);
            Operation::BeginTableMethod { name, signature }
        }
        18 => Operation::EndTableMethod,
        19 => Operation::CreateArray { first_variadic_input: read_u32(r.cursor)? as usize },
        20 => Operation::GetProperty { name: SmolStr::new(read_string(r)?) },
        21 => Operation::SetProperty { name: SmolStr::new(read_string(r)?) },
        22 => {
            let name = SmolStr::new(read_string(r)?);
            let op = binary_from_tag(read_u8(r.cursor)?)?;
            Operation::UpdateProperty { name, op }
        }
        23 => Operation::DeleteProperty { name: SmolStr::new(read_string(r)?) },
        24 => Operation::GetElement,
        25 => Operation::SetElement,
        26 => Operation::UpdateElement { op: binary_from_tag(read_u8(r.cursor)?)? },
        27 => Operation::DeleteElement,
        28 => Operation::BeginIf { inverted: read_u8(r.cursor)? != 0 },
        29 => Operation::BeginElse,
        30 => Operation::EndIf,
        31 => Operation::BeginWhileHeader,
        32 => Operation::BeginWhileBody,
        33 => Operation::EndWhile,
        34 => Operation::BeginForInitializer,
        35 => Operation::BeginForCondition,
        36 => Operation::BeginForAfterthought,
        37 => Operation::BeginForBody,
        38 => Operation::EndFor,
        39 => Operation::BeginForIn { num_loop_variables: read_u32(r.cursor)? as usize },
        40 => Operation::EndForIn,
        41 => Operation::BeginRepeat { has_counter: read_u8(r.cursor)? != 0 },
        42 => Operation::EndRepeat,
        43 => Operation::LoopBreak,
        44 => Operation::Label,
        45 => Operation::Goto,
        46 => {
            let signature = Rc::new(read_signature(r.cursor)?);
            let is_method = read_u8(r.cursor)? != 0;
            Operation::BeginFunction { signature, is_method }
        }
        47 => Operation::EndFunction,
        48 => Operation::Return,
        49 => Operation::CallFunction { first_variadic_input: read_u32(r.cursor)? as usize },
        50 => {
            let name = SmolStr::new(read_string(r)?);
            let first_variadic_input = read_u32(r.cursor)? as usize;
            Operation::CallMethod { name, first_variadic_input }
        }
        51 => Operation::Nop,
        tag => return Err(SerializeError::InvalidOperationTag(tag)),
    })
}

fn write_operation(w: &mut Writer, op: &Operation) {
    if let Some(index) = w.op_cache.iter().position(|cached| cached == op) {
        write_u16(w.buf, OP_CACHE_REF);
        write_u32(w.buf, index as u32);
        return;
    }
    write_u16(w.buf, operation_tag(op));
    write_operation_payload(w, op);
    w.op_cache.push(op.clone());
}

fn read_operation(r: &mut Reader) -> Result<Operation> {
    let tag = read_u16(r.cursor)?;
    if tag == OP_CACHE_REF {
        let index = read_u32(r.cursor)?;
        return r
            .op_cache
            .get(index as usize)
            .cloned()
            .ok_or(SerializeError::InvalidCacheRef(index));
    }
    let op = read_operation_payload(r, tag)?;
    r.op_cache.push(op.clone());
    Ok(op)
}

fn write_instruction(w: &mut Writer, instr: &Instruction) {
    write_u32(w.buf, instr.inputs().len() as u32);
    write_u32(w.buf, instr.outputs().len() as u32);
    write_u32(w.buf, instr.inner_outputs().len() as u32);
    for v in instr.inouts().all_variables() {
        write_variable(w.buf, *v);
    }
    write_operation(w, instr.operation());
    match instr.index() {
        Some(index) => {
            w.buf.push(1);
            write_u32(w.buf, index);
        }
        None => w.buf.push(0),
    }
}

fn read_instruction(r: &mut Reader) -> Result<Instruction> {
    let num_inputs = read_u32(r.cursor)? as usize;
    let num_outputs = read_u32(r.cursor)? as usize;
    let num_inner_outputs = read_u32(r.cursor)? as usize;

    let mut inputs = Vec::with_capacity(num_inputs);
    for _ in 0..num_inputs {
        inputs.push(read_variable(r.cursor)?);
    }
    let mut outputs = Vec::with_capacity(num_outputs);
    for _ in 0..num_outputs {
        outputs.push(read_variable(r.cursor)?);
    }
    let mut inner_outputs = Vec::with_capacity(num_inner_outputs);
    for _ in 0..num_inner_outputs {
        inner_outputs.push(read_variable(r.cursor)?);
    }

    let operation = read_operation(r)?;
    let inouts = Inouts::new(inputs, outputs, inner_outputs);

    Ok(match read_u8(r.cursor)? {
        0 => Instruction::new(operation, inouts),
        _ => Instruction::with_index(operation, inouts, read_u32(r.cursor)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LuaType;

    fn v(n: u32) -> Variable {
        Variable::new(n, VariableLocality::ScopedToBlock)
    }

    fn sample_program() -> Program {
        let mut code = Code::new();
        code.push(Instruction::new(
            Operation::LoadInteger(7),
            Inouts::new(vec![], vec![v(0)], vec![]),
        ));
        code.push(Instruction::new(
            Operation::LoadString("door".into()),
            Inouts::new(vec![], vec![v(1)], vec![]),
        ));
        code.push(Instruction::new(
            Operation::GetProperty { name: "door".into() },
            Inouts::new(vec![v(1)], vec![v(2)], vec![]),
        ));
        code.push(Instruction::new(
            Operation::Binary(BinaryOperator::Add),
            Inouts::new(vec![v(0), v(2)], vec![v(3)], vec![]),
        ));
        let mut program = Program::new(code);
        program.add_contributor("seed-corpus");
        program.set_comment(0, "initial value");
        program
    }

    #[test]
    fn round_trips_a_small_program() {
        let original = sample_program();
        let bytes = serialize_program(&original);
        let restored = deserialize_program(&bytes).unwrap();

        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.code().len(), original.code().len());
        assert_eq!(restored.contributors(), original.contributors());
        assert_eq!(restored.comment_at(0), Some("initial value"));
        for (a, b) in original.code().iter().zip(restored.code().iter()) {
            assert_eq!(a.operation(), b.operation());
            assert_eq!(a.inputs(), b.inputs());
            assert_eq!(a.outputs(), b.outputs());
        }
    }

    #[test]
    fn deduplicates_repeated_operations() {
        let mut code = Code::new();
        for _ in 0..3 {
            code.push(Instruction::new(
                Operation::GetProperty { name: "length".into() },
                Inouts::new(vec![v(0)], vec![v(1)], vec![]),
            ));
        }
        let program = Program::new(code);
        let plain_len = {
            let mut buf = Vec::new();
            for instr in program.code().iter() {
                write_instruction(
                    &mut Writer { buf: &mut buf, strings: HashMap::new(), op_cache: Vec::new() },
                    instr,
                );
            }
            buf.len()
        };
        let deduped = serialize_program(&program);
        // The full program (with header) should still beat three
        // independent, non-cached encodes of the same instruction.
        assert!(deduped.len() < plain_len * 3);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = deserialize_program(b"not-a-program").unwrap_err();
        assert!(matches!(err, SerializeError::BadMagic));
    }

    #[test]
    fn signature_round_trips_through_begin_function() {
        let signature = Rc::new(
            Signature::new(
                vec![Parameter::Plain(LuaType::integer()), Parameter::Rest(LuaType::anything())],
                vec![LuaType::string()],
            )
            .unwrap(),
        );
        let mut code = Code::new();
        code.push(Instruction::new(
            Operation::BeginFunction { signature: Rc::clone(&signature), is_method: false },
            Inouts::new(vec![], vec![], vec![v(0), v(1)]),
        ));
        code.push(Instruction::new(Operation::Return, Inouts::new(vec![], vec![], vec![])));
        code.push(Instruction::new(
            Operation::EndFunction,
            Inouts::new(vec![], vec![v(2)], vec![]),
        ));
        let program = Program::new(code);
        let restored = deserialize_program(&serialize_program(&program)).unwrap();
        let Operation::BeginFunction { signature: restored_sig, .. } = restored.code().get(0).unwrap().operation()
        else {
            panic!("expected BeginFunction");
        };
        assert_eq!(restored_sig.parameters().len(), 2);
        assert_eq!(restored_sig.returns().len(), 1);
    }
}
