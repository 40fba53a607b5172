//! IR → Lua source translator (spec.md §4.8).
//!
//! Walks a [`Program`]'s flat instruction stream and reconstitutes
//! structured Lua text, driven entirely by each [`Operation`]'s
//! [`InstructionFlags`](crate::instruction::InstructionFlags) — block
//! starts push a new indent level, block ends pop one. An expression
//! inliner avoids spurious `local` temporaries: pure results are
//! substituted at every use site, effectful results are substituted
//! only at their first use and only while nothing else effectful is
//! still waiting ahead of them in program order.
//!
//! Every IR variable becomes the Lua identifier `v<number>`; variables
//! with [`VariableLocality::ModuleGlobal`](crate::variable::VariableLocality)
//! are assigned without a `local` keyword so they really do escape
//! their defining block, matching what the scope analyzer promoted
//! them for in the first place.
//!
//! Lua has neither a C-style three-clause `for` nor a comma operator,
//! so two IR shapes get widened rather than transliterated: a four-
//! segment `for` (initializer/condition/afterthought/body) becomes
//! `<init>; while true do <cond-recompute>; if not (cond) then break
//! end; <body>; <afterthought> end`, and a loop condition with pending
//! prelude statements becomes `while true do <prelude>; if not (cond)
//! then break end ... end` instead of `while <cond> do`.

use std::collections::VecDeque;

use ahash::AHashMap as HashMap;
use itoa::Buffer as IntBuffer;
use smol_str::SmolStr;

use crate::code::Code;
use crate::instruction::operators::UnaryOperator;
use crate::instruction::{Instruction, Operation};
use crate::program::Program;
use crate::variable::Variable;

/// What a currently-open block contributes to its parent once its
/// closing instruction is reached.
enum ScopeKind {
    Top,
    /// Plain nested statement list: if/else bodies, while/for-in
    /// bodies, repeat bodies — nothing extra to reassemble at close.
    Block,
    Table { handle: Variable },
    TableMethod { name: SmolStr, params: Vec<Variable>, table: Variable },
    Function { params: Vec<Variable> },
    Repeat { counter: Option<Variable> },
    /// Open between `BeginForCondition` and `BeginForAfterthought`:
    /// carries the initializer's already-closed statements forward.
    ForCarryInit { init: Vec<String> },
    /// Open between `BeginForAfterthought` and `BeginForBody`: carries
    /// the pieces already closed (initializer, condition) so the body
    /// transition can assemble the widened `while true do` header.
    ForPending { init: Vec<String>, cond_lines: Vec<String>, cond_text: String },
    /// The `for` loop's body proper; carries the afterthought's own
    /// statements so `EndFor` can append them after the body.
    ForBody { afterthought: Vec<String> },
}

struct Scope {
    indent: usize,
    lines: Vec<String>,
    kind: ScopeKind,
}

/// Stateful IR-to-Lua translator. One instance lifts one [`Program`].
pub struct Lifter {
    scopes: Vec<Scope>,
    /// Pure results: substitutable at every use, never flushed.
    pure_exprs: HashMap<Variable, String>,
    /// Effectful results awaiting their first (in-order) use.
    pending: VecDeque<(Variable, String)>,
    /// Most recently produced single-output value, used as the
    /// implicit boolean result of a `for` condition segment (the
    /// segments share no dedicated "result" slot — see DESIGN.md).
    last_output: Option<Variable>,
    /// `Label`'s output variable -> the Lua label identifier emitted for
    /// it at `::name::`, consulted by `Goto` to resolve its jump target.
    label_names: HashMap<Variable, String>,
    int_buf: IntBuffer,
}

impl Default for Lifter {
    fn default() -> Self {
        Lifter::new()
    }
}

impl Lifter {
    pub fn new() -> Self {
        Lifter {
            scopes: vec![Scope { indent: 0, lines: Vec::new(), kind: ScopeKind::Top }],
            pure_exprs: HashMap::default(),
            pending: VecDeque::new(),
            last_output: None,
            label_names: HashMap::default(),
            int_buf: IntBuffer::new(),
        }
    }

    pub fn run(&mut self, code: &Code) {
        for instr in code.iter() {
            self.step(instr);
        }
    }

    pub fn finish(mut self) -> String {
        self.flush_pending();
        let root = self.scopes.pop().expect("root scope always present");
        root.lines.join("\n")
    }

    fn pad_at(indent: usize) -> String {
        "    ".repeat(indent)
    }

    fn emit_line(&mut self, text: impl AsRef<str>) {
        let scope = self.scopes.last_mut().unwrap();
        scope.lines.push(format!("{}{}", Self::pad_at(scope.indent), text.as_ref()));
    }

    /// Appends an already-indented line (captured from a child scope)
    /// to the current scope verbatim.
    fn adopt_line(&mut self, line: String) {
        self.scopes.last_mut().unwrap().lines.push(line);
    }

    fn adopt_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            self.adopt_line(line);
        }
    }

    fn push_scope(&mut self, kind: ScopeKind) {
        let indent = self.scopes.len();
        self.scopes.push(Scope { indent, lines: Vec::new(), kind });
    }

    fn pop_scope(&mut self) -> Scope {
        self.flush_pending();
        self.scopes.pop().expect("pop_scope called without a matching push_scope")
    }

    fn ident(v: Variable) -> String {
        format!("v{}", v.number())
    }

    fn declare(&mut self, v: Variable, rhs: &str) {
        let keyword = if v.is_global() { "" } else { "local " };
        self.emit_line(format!("{keyword}{} = {rhs}", Self::ident(v)));
    }

    /// Declares `v` with no initializer — used for block-exposed
    /// inner-output slots that the IR treats as already bound (loop
    /// counters, for-segment placeholders) without specifying a value.
    fn declare_nil(&mut self, v: Variable) {
        if !v.is_global() {
            self.emit_line(format!("local {}", Self::ident(v)));
        }
    }

    fn flush_pending(&mut self) {
        while let Some((v, text)) = self.pending.pop_front() {
            self.declare(v, &text);
        }
    }

    /// Resolves an input variable to the Lua text that should appear
    /// at this use site, applying the inliner rules.
    fn resolve(&mut self, v: Variable) -> String {
        if let Some(text) = self.pure_exprs.get(&v) {
            return text.clone();
        }
        match self.pending.front() {
            Some((front, _)) if *front == v => {
                let (_, text) = self.pending.pop_front().unwrap();
                text
            }
            Some(_) => {
                self.flush_pending();
                Self::ident(v)
            }
            None => Self::ident(v),
        }
    }

    fn resolve_all(&mut self, vars: &[Variable]) -> Vec<String> {
        vars.iter().map(|&v| self.resolve(v)).collect()
    }

    /// Records `v`'s computed text either for unconditional inlining
    /// (pure) or as a deferred, order-sensitive statement (effectful).
    fn record_result(&mut self, v: Variable, text: String, pure: bool) {
        self.last_output = Some(v);
        if pure {
            self.pure_exprs.insert(v, text);
        } else {
            self.pending.push_back((v, text));
        }
    }

    fn escape_lua_string(s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('"');
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                other => out.push(other),
            }
        }
        out.push('"');
        out
    }

    fn format_float(f: f64) -> String {
        if f.is_nan() {
            "(0/0)".to_string()
        } else if f.is_infinite() {
            if f > 0.0 { "math.huge".to_string() } else { "-math.huge".to_string() }
        } else if f.fract() == 0.0 && f.abs() < 1e15 {
            format!("{f:.1}")
        } else {
            format!("{f}")
        }
    }

    fn step(&mut self, instr: &Instruction) {
        use Operation::*;
        let op = instr.operation().clone();
        match op {
            LoadInteger(n) => {
                let text = self.int_buf.format(n).to_string();
                self.record_result(instr.outputs()[0], text, true);
            }
            LoadFloat(f) => {
                self.record_result(instr.outputs()[0], Self::format_float(f), true);
            }
            LoadString(s) => {
                self.record_result(instr.outputs()[0], Self::escape_lua_string(&s), true);
            }
            LoadBoolean(b) => {
                self.record_result(instr.outputs()[0], b.to_string(), true);
            }
            LoadNil | LoadUndefined => {
                self.record_result(instr.outputs()[0], "nil".to_string(), true);
            }
            LoadBuiltin(name) => {
                self.record_result(instr.outputs()[0], name.to_string(), true);
            }
            LoadPair => {
                // Seeds a constant (key, value) pair for table/for-in
                // generators; lifted as a two-element array literal.
                self.record_result(instr.outputs()[0], "{}".to_string(), true);
            }

            Unary(operator) => {
                let args = self.resolve_all(instr.inputs());
                let text = match operator {
                    UnaryOperator::Not => format!("(not {})", args[0]),
                    other => format!("({}{})", other.as_lua_str(), args[0]),
                };
                self.record_result(instr.outputs()[0], text, true);
            }
            Binary(operator) => {
                let args = self.resolve_all(instr.inputs());
                let text = format!("({} {} {})", args[0], operator.as_lua_str(), args[1]);
                self.record_result(instr.outputs()[0], text, true);
            }
            Compare(operator) => {
                let args = self.resolve_all(instr.inputs());
                let text = format!("({} {} {})", args[0], operator.as_lua_str(), args[1]);
                self.record_result(instr.outputs()[0], text, true);
            }
            Update(operator) => {
                let target = Self::ident(instr.inputs()[0]);
                let rhs = self.resolve(instr.inputs()[1]);
                self.flush_pending();
                self.emit_line(format!("{target} = {target} {} {rhs}", operator.as_lua_str()));
                self.pure_exprs.insert(instr.outputs()[0], target);
                self.last_output = Some(instr.outputs()[0]);
            }
            Reassign => {
                let target = Self::ident(instr.inputs()[0]);
                let rhs = self.resolve(instr.inputs()[1]);
                self.flush_pending();
                self.emit_line(format!("{target} = {rhs}"));
                self.pure_exprs.insert(instr.outputs()[0], target);
                self.last_output = Some(instr.outputs()[0]);
            }

            BeginTable => {
                let handle = instr.inner_outputs()[0];
                self.flush_pending();
                self.declare(handle, "{}");
                self.push_scope(ScopeKind::Table { handle });
            }
            EndTable => {
                let handle_text = self.resolve(instr.inputs()[0]);
                let scope = self.pop_scope();
                self.adopt_lines(scope.lines);
                self.record_result(instr.outputs()[0], handle_text, true);
            }
            TableAddProperty { name } => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!("{}.{name} = {}", args[0], args[1]));
            }
            TableAddElement => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!("table.insert({}, {})", args[0], args[1]));
            }
            BeginTableMethod { name, signature } => {
                let _ = signature;
                let mut inner = instr.inner_outputs().iter().copied();
                let receiver = inner.next().expect("BeginTableMethod always exposes self");
                let params: Vec<Variable> = inner.collect();
                let table = match self.scopes.last().map(|s| &s.kind) {
                    Some(ScopeKind::Table { handle }) => *handle,
                    _ => receiver,
                };
                self.push_scope(ScopeKind::TableMethod { name, params, table });
            }
            EndTableMethod => {
                let scope = self.pop_scope();
                let ScopeKind::TableMethod { name, params, table } = scope.kind else {
                    unreachable!("EndTableMethod must close a TableMethod scope")
                };
                let mut header_params = vec!["self".to_string()];
                header_params.extend(params.iter().map(|&p| Self::ident(p)));
                self.emit_line(format!(
                    "{}.{name} = function({})",
                    Self::ident(table),
                    header_params.join(", ")
                ));
                self.adopt_lines(scope.lines);
                self.emit_line("end");
            }
            CreateArray { first_variadic_input } => {
                let _ = first_variadic_input;
                let args = self.resolve_all(instr.inputs());
                self.record_result(instr.outputs()[0], format!("{{ {} }}", args.join(", ")), instr.is_pure());
            }

            GetProperty { name } => {
                let args = self.resolve_all(instr.inputs());
                self.record_result(instr.outputs()[0], format!("{}.{name}", args[0]), instr.is_pure());
            }
            SetProperty { name } => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!("{}.{name} = {}", args[0], args[1]));
            }
            UpdateProperty { name, op } => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!("{}.{name} = {}.{name} {} {}", args[0], args[0], op.as_lua_str(), args[1]));
            }
            DeleteProperty { name } => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!("{}.{name} = nil", args[0]));
            }
            GetElement => {
                let args = self.resolve_all(instr.inputs());
                self.record_result(instr.outputs()[0], format!("{}[{}]", args[0], args[1]), instr.is_pure());
            }
            SetElement => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!("{}[{}] = {}", args[0], args[1], args[2]));
            }
            UpdateElement { op } => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!(
                    "{}[{}] = {}[{}] {} {}",
                    args[0], args[1], args[0], args[1], op.as_lua_str(), args[2]
                ));
            }
            DeleteElement => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                self.emit_line(format!("{}[{}] = nil", args[0], args[1]));
            }

            BeginIf { inverted } => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                let cond = if inverted { format!("not ({})", args[0]) } else { args[0].clone() };
                self.emit_line(format!("if {cond} then"));
                self.push_scope(ScopeKind::Block);
            }
            BeginElse => {
                let scope = self.pop_scope();
                self.adopt_lines(scope.lines);
                self.emit_line("else");
                self.push_scope(ScopeKind::Block);
            }
            EndIf => {
                let scope = self.pop_scope();
                self.adopt_lines(scope.lines);
                self.emit_line("end");
            }

            BeginWhileHeader => {
                self.push_scope(ScopeKind::Block);
            }
            BeginWhileBody => {
                let cond = self.resolve(instr.inputs()[0]);
                let header = self.pop_scope();
                if header.lines.is_empty() {
                    self.emit_line(format!("while {cond} do"));
                } else {
                    self.emit_line("while true do");
                    self.adopt_lines(header.lines);
                    let indent = self.scopes.last().unwrap().indent;
                    self.adopt_line(format!("{}if not ({cond}) then break end", Self::pad_at(indent)));
                }
                self.push_scope(ScopeKind::Block);
            }
            EndWhile => {
                let scope = self.pop_scope();
                self.adopt_lines(scope.lines);
                self.emit_line("end");
            }

            BeginForInitializer => {
                let slot = instr.inner_outputs()[0];
                self.push_scope(ScopeKind::Block);
                self.declare_nil(slot);
            }
            BeginForCondition => {
                let slot = instr.inner_outputs()[0];
                let init = self.pop_scope().lines;
                self.push_scope(ScopeKind::ForCarryInit { init });
                self.declare_nil(slot);
            }
            BeginForAfterthought => {
                let slot = instr.inner_outputs()[0];
                self.flush_pending();
                let cond_scope = self.pop_scope();
                let ScopeKind::ForCarryInit { init } = cond_scope.kind else {
                    unreachable!("BeginForAfterthought always follows the condition ForCarryInit scope")
                };
                let cond_text = self.last_output.map(Self::ident).unwrap_or_else(|| "true".to_string());
                self.last_output = None;
                self.push_scope(ScopeKind::ForPending { init, cond_lines: cond_scope.lines, cond_text });
                self.declare_nil(slot);
            }
            BeginForBody => {
                let slot = instr.inner_outputs()[0];
                let scope = self.pop_scope();
                let ScopeKind::ForPending { init, cond_lines, cond_text } = scope.kind else {
                    unreachable!("BeginForBody always follows the afterthought ForPending scope")
                };
                // `scope.lines` holds the afterthought's own statements,
                // accumulated while this ForPending scope was on top.
                self.adopt_lines(init);
                self.emit_line("while true do");
                self.push_scope(ScopeKind::ForBody { afterthought: scope.lines });
                self.adopt_lines(cond_lines);
                let indent = self.scopes.last().unwrap().indent;
                self.adopt_line(format!("{}if not ({cond_text}) then break end", Self::pad_at(indent)));
                self.declare_nil(slot);
            }
            EndFor => {
                let scope = self.pop_scope();
                let ScopeKind::ForBody { afterthought } = scope.kind else {
                    unreachable!("EndFor must close the for-body scope")
                };
                self.adopt_lines(scope.lines);
                self.adopt_lines(afterthought);
                self.emit_line("end");
            }

            BeginForIn { num_loop_variables } => {
                let iterable = self.resolve(instr.inputs()[0]);
                self.flush_pending();
                let loop_vars = instr.inner_outputs();
                debug_assert_eq!(loop_vars.len(), num_loop_variables);
                let names: Vec<String> = loop_vars.iter().map(|&v| Self::ident(v)).collect();
                self.emit_line(format!("for {} in pairs({iterable}) do", names.join(", ")));
                self.push_scope(ScopeKind::Block);
            }
            EndForIn => {
                let scope = self.pop_scope();
                self.adopt_lines(scope.lines);
                self.emit_line("end");
            }

            BeginRepeat { has_counter } => {
                let counter = if has_counter { instr.inner_outputs().first().copied() } else { None };
                self.flush_pending();
                self.emit_line("repeat");
                self.push_scope(ScopeKind::Repeat { counter });
                if let Some(c) = counter {
                    self.declare(c, "0");
                }
            }
            EndRepeat => {
                let cond = self.resolve(instr.inputs()[0]);
                let scope = self.pop_scope();
                let ScopeKind::Repeat { counter } = scope.kind else {
                    unreachable!("EndRepeat must close a Repeat scope")
                };
                self.adopt_lines(scope.lines);
                if let Some(c) = counter {
                    let ident = Self::ident(c);
                    self.emit_line(format!("{ident} = {ident} + 1"));
                }
                self.emit_line(format!("until {cond}"));
            }

            LoopBreak => {
                self.flush_pending();
                self.emit_line("break");
            }
            Label => {
                // Lua labels aren't values; the handle this opcode hands
                // out only ever flows into a matching `Goto`, which looks
                // it up in `label_names` rather than resolving it as an
                // expression.
                let output = instr.outputs()[0];
                let name = format!("label_{}", output.number());
                self.flush_pending();
                self.emit_line(format!("::{name}::"));
                self.label_names.insert(output, name);
            }
            Goto => {
                let target = instr.inputs()[0];
                self.flush_pending();
                let name = self
                    .label_names
                    .get(&target)
                    .cloned()
                    .unwrap_or_else(|| Self::ident(target));
                self.emit_line(format!("goto {name}"));
            }

            BeginFunction { signature, is_method } => {
                let _ = is_method;
                let params: Vec<Variable> = instr.inner_outputs().to_vec();
                let _ = signature;
                self.flush_pending();
                self.push_scope(ScopeKind::Function { params });
            }
            EndFunction => {
                let scope = self.pop_scope();
                let ScopeKind::Function { params } = scope.kind else {
                    unreachable!("EndFunction must close a Function scope")
                };
                let names: Vec<String> = params.iter().map(|&p| Self::ident(p)).collect();
                let indent = Self::pad_at(scope.indent - 1);
                let mut text = format!("function({})\n", names.join(", "));
                for line in &scope.lines {
                    text.push_str(line);
                    text.push('\n');
                }
                text.push_str(&indent);
                text.push_str("end");
                self.record_result(instr.outputs()[0], text, false);
            }
            Return => {
                let args = self.resolve_all(instr.inputs());
                self.flush_pending();
                if args.is_empty() {
                    self.emit_line("return");
                } else {
                    self.emit_line(format!("return {}", args.join(", ")));
                }
            }
            CallFunction { first_variadic_input } => {
                let args = self.resolve_all(instr.inputs());
                let callee = args[0].clone();
                let call_args = &args[first_variadic_input.max(1)..];
                let text = format!("{callee}({})", call_args.join(", "));
                self.record_result(instr.outputs()[0], text, false);
            }
            CallMethod { name, first_variadic_input } => {
                let args = self.resolve_all(instr.inputs());
                let receiver = args[0].clone();
                let call_args = &args[first_variadic_input.max(1)..];
                let text = format!("{receiver}:{name}({})", call_args.join(", "));
                self.record_result(instr.outputs()[0], text, false);
            }

            Nop => {}
        }
    }
}

/// Lifts a finished program into Lua source text.
pub fn lift(program: &Program) -> String {
    let mut lifter = Lifter::new();
    lifter.run(program.code());
    lifter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Inouts;
    use crate::variable::VariableLocality;

    fn v(n: u32) -> Variable {
        Variable::new(n, VariableLocality::ScopedToBlock)
    }

    #[test]
    fn lifts_arithmetic_inline_without_temporaries() {
        let mut code = Code::new();
        code.push(Instruction::new(Operation::LoadInteger(2), Inouts::new(vec![], vec![v(0)], vec![])));
        code.push(Instruction::new(Operation::LoadInteger(3), Inouts::new(vec![], vec![v(1)], vec![])));
        code.push(Instruction::new(
            Operation::Binary(crate::instruction::operators::BinaryOperator::Add),
            Inouts::new(vec![v(0), v(1)], vec![v(2)], vec![]),
        ));
        code.push(Instruction::new(
            Operation::CallFunction { first_variadic_input: 1 },
            Inouts::new(vec![v(3), v(2)], vec![v(4)], vec![]),
        ));
        let program = Program::new(code);
        let lua = lift(&program);
        // v3 (the callee) was never defined in this snippet, so it
        // resolves to a bare identifier; the arithmetic result stays
        // inlined as a pure expression rather than a named local.
        assert!(lua.contains("(2 + 3)"));
        assert!(!lua.contains("local v2"));
    }

    #[test]
    fn flushes_pending_call_before_out_of_order_use() {
        let mut code = Code::new();
        code.push(Instruction::new(Operation::LoadBuiltin("print".into()), Inouts::new(vec![], vec![v(0)], vec![])));
        code.push(Instruction::new(
            Operation::CallFunction { first_variadic_input: 1 },
            Inouts::new(vec![v(0)], vec![v(1)], vec![]),
        ));
        code.push(Instruction::new(Operation::LoadInteger(1), Inouts::new(vec![], vec![v(2)], vec![])));
        // v1 (the call result) is used a second time, forcing
        // materialization since it can only inline at its first use.
        code.push(Instruction::new(
            Operation::Binary(crate::instruction::operators::BinaryOperator::Add),
            Inouts::new(vec![v(1), v(2)], vec![v(3)], vec![]),
        ));
        code.push(Instruction::new(
            Operation::Binary(crate::instruction::operators::BinaryOperator::Add),
            Inouts::new(vec![v(1), v(3)], vec![v(4)], vec![]),
        ));
        let program = Program::new(code);
        let lua = lift(&program);
        assert!(lua.contains("local v1 = print()"));
    }

    #[test]
    fn lifts_if_else() {
        let mut code = Code::new();
        code.push(Instruction::new(Operation::LoadBoolean(true), Inouts::new(vec![], vec![v(0)], vec![])));
        code.push(Instruction::new(Operation::BeginIf { inverted: false }, Inouts::new(vec![v(0)], vec![], vec![])));
        code.push(Instruction::new(Operation::LoadInteger(1), Inouts::new(vec![], vec![v(1)], vec![])));
        code.push(Instruction::new(Operation::BeginElse, Inouts::new(vec![], vec![], vec![])));
        code.push(Instruction::new(Operation::LoadInteger(2), Inouts::new(vec![], vec![v(2)], vec![])));
        code.push(Instruction::new(Operation::EndIf, Inouts::new(vec![], vec![], vec![])));
        let program = Program::new(code);
        let lua = lift(&program);
        assert!(lua.contains("if true then"));
        assert!(lua.contains("else"));
        assert!(lua.trim_end().ends_with("end"));
    }

    #[test]
    fn lifts_while_loop_with_simple_condition() {
        let mut code = Code::new();
        code.push(Instruction::new(Operation::BeginWhileHeader, Inouts::new(vec![], vec![], vec![])));
        code.push(Instruction::new(Operation::LoadBoolean(true), Inouts::new(vec![], vec![v(0)], vec![])));
        code.push(Instruction::new(Operation::BeginWhileBody, Inouts::new(vec![v(0)], vec![], vec![])));
        code.push(Instruction::new(Operation::LoopBreak, Inouts::new(vec![], vec![], vec![])));
        code.push(Instruction::new(Operation::EndWhile, Inouts::new(vec![], vec![], vec![])));
        let program = Program::new(code);
        let lua = lift(&program);
        assert!(lua.contains("while true do"));
        assert!(lua.contains("break"));
    }

    #[test]
    fn lifts_function_expression_as_a_reusable_pending_value() {
        let mut code = Code::new();
        let signature = std::rc::Rc::new(
            crate::types::Signature::new(
                vec![crate::types::Parameter::Plain(crate::types::LuaType::anything())],
                vec![],
            )
            .unwrap(),
        );
        code.push(Instruction::new(
            Operation::BeginFunction { signature, is_method: false },
            Inouts::new(vec![], vec![], vec![v(0)]),
        ));
        code.push(Instruction::new(Operation::Return, Inouts::new(vec![v(0)], vec![], vec![])));
        code.push(Instruction::new(Operation::EndFunction, Inouts::new(vec![], vec![v(1)], vec![])));
        code.push(Instruction::new(Operation::Reassign, Inouts::new(vec![v(1), v(1)], vec![v(2)], vec![])));
        let program = Program::new(code);
        let lua = lift(&program);
        assert!(lua.contains("function(v0)"));
        assert!(lua.contains("return v0"));
    }

    #[test]
    fn lifts_goto_to_its_matching_label() {
        let mut code = Code::new();
        code.push(Instruction::new(Operation::Label, Inouts::new(vec![], vec![v(0)], vec![])));
        code.push(Instruction::new(Operation::LoadInteger(1), Inouts::new(vec![], vec![v(1)], vec![])));
        code.push(Instruction::new(Operation::Goto, Inouts::new(vec![v(0)], vec![], vec![])));
        let program = Program::new(code);
        let lua = lift(&program);
        assert!(lua.contains("::label_0::"));
        assert!(lua.contains("goto label_0"));
    }
}
