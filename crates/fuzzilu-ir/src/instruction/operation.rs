use smol_str::SmolStr;
use std::rc::Rc;

use super::operators::{BinaryOperator, CompareOperator, UnaryOperator};
use crate::types::Signature;

/// One opcode per variant, carrying whatever non-variable payload the
/// operation needs (operator kind, property name, signature, ...).
/// Variable operands themselves live in the [`crate::instruction::Inouts`]
/// that accompanies each [`crate::instruction::Instruction`], not here —
/// this keeps `Operation` cheap to clone and lets `OperationMutator`
/// substitute a payload without touching the variable graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    // ---- load-constants ----
    LoadInteger(i64),
    LoadFloat(f64),
    LoadString(SmolStr),
    LoadBoolean(bool),
    LoadNil,
    LoadUndefined,
    /// Loads a well-known global/library identifier from the
    /// environment model (e.g. `math`, `string`, `print`).
    LoadBuiltin(SmolStr),
    /// Loads a constant `(key, value)` pair, used to seed table
    /// literals and generic-for headers with a concrete element.
    LoadPair,

    // ---- arithmetic / logic ----
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    Compare(CompareOperator),
    /// Compound assignment: `lhs <op>= rhs`.
    Update(BinaryOperator),
    /// Plain reassignment: `lhs = rhs`.
    Reassign,

    // ---- aggregate construction ----
    BeginTable,
    EndTable,
    TableAddProperty { name: SmolStr },
    TableAddElement,
    BeginTableMethod { name: SmolStr, signature: Rc<Signature> },
    EndTableMethod,
    CreateArray { first_variadic_input: usize },

    // ---- property / element access ----
    GetProperty { name: SmolStr },
    SetProperty { name: SmolStr },
    UpdateProperty { name: SmolStr, op: BinaryOperator },
    DeleteProperty { name: SmolStr },
    GetElement,
    SetElement,
    UpdateElement { op: BinaryOperator },
    DeleteElement,

    // ---- control flow ----
    BeginIf { inverted: bool },
    BeginElse,
    EndIf,
    BeginWhileHeader,
    BeginWhileBody,
    EndWhile,
    BeginForInitializer,
    BeginForCondition,
    BeginForAfterthought,
    BeginForBody,
    EndFor,
    BeginForIn { num_loop_variables: usize },
    EndForIn,
    BeginRepeat { has_counter: bool },
    EndRepeat,
    LoopBreak,
    Label,
    Goto,

    // ---- calls ----
    BeginFunction { signature: Rc<Signature>, is_method: bool },
    EndFunction,
    Return,
    CallFunction { first_variadic_input: usize },
    CallMethod { name: SmolStr, first_variadic_input: usize },

    Nop,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::LoadInteger(_) => "LoadInteger",
            Operation::LoadFloat(_) => "LoadFloat",
            Operation::LoadString(_) => "LoadString",
            Operation::LoadBoolean(_) => "LoadBoolean",
            Operation::LoadNil => "LoadNil",
            Operation::LoadUndefined => "LoadUndefined",
            Operation::LoadBuiltin(_) => "LoadBuiltin",
            Operation::LoadPair => "LoadPair",
            Operation::Unary(_) => "Unary",
            Operation::Binary(_) => "Binary",
            Operation::Compare(_) => "Compare",
            Operation::Update(_) => "Update",
            Operation::Reassign => "Reassign",
            Operation::BeginTable => "BeginTable",
            Operation::EndTable => "EndTable",
            Operation::TableAddProperty { .. } => "TableAddProperty",
            Operation::TableAddElement => "TableAddElement",
            Operation::BeginTableMethod { .. } => "BeginTableMethod",
            Operation::EndTableMethod => "EndTableMethod",
            Operation::CreateArray { .. } => "CreateArray",
            Operation::GetProperty { .. } => "GetProperty",
            Operation::SetProperty { .. } => "SetProperty",
            Operation::UpdateProperty { .. } => "UpdateProperty",
            Operation::DeleteProperty { .. } => "DeleteProperty",
            Operation::GetElement => "GetElement",
            Operation::SetElement => "SetElement",
            Operation::UpdateElement { .. } => "UpdateElement",
            Operation::DeleteElement => "DeleteElement",
            Operation::BeginIf { .. } => "BeginIf",
            Operation::BeginElse => "BeginElse",
            Operation::EndIf => "EndIf",
            Operation::BeginWhileHeader => "BeginWhileHeader",
            Operation::BeginWhileBody => "BeginWhileBody",
            Operation::EndWhile => "EndWhile",
            Operation::BeginForInitializer => "BeginForInitializer",
            Operation::BeginForCondition => "BeginForCondition",
            Operation::BeginForAfterthought => "BeginForAfterthought",
            Operation::BeginForBody => "BeginForBody",
            Operation::EndFor => "EndFor",
            Operation::BeginForIn { .. } => "BeginForIn",
            Operation::EndForIn => "EndForIn",
            Operation::BeginRepeat { .. } => "BeginRepeat",
            Operation::EndRepeat => "EndRepeat",
            Operation::LoopBreak => "LoopBreak",
            Operation::Label => "Label",
            Operation::Goto => "Goto",
            Operation::BeginFunction { .. } => "BeginFunction",
            Operation::EndFunction => "EndFunction",
            Operation::Return => "Return",
            Operation::CallFunction { .. } => "CallFunction",
            Operation::CallMethod { .. } => "CallMethod",
            Operation::Nop => "Nop",
        }
    }
}
