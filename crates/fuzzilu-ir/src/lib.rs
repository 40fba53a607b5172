//! Typed, block-structured intermediate representation for fuzzilu's
//! Lua-targeting fuzzer: the instruction set, static validator, flow
//! analyses, environment model, program builder, and splicer that
//! together replace Fuzzilli's `FuzzIL` for a Lua target.
//!
//! A [`Program`] wraps an immutable [`Code`] — a flat, SSA-like
//! sequence of [`Instruction`](instruction::Instruction)s operating on
//! never-reused [`Variable`]s. [`validator::Validator`] checks
//! structural well-formedness; [`analysis`] holds the four
//! flow-insensitive passes plus the flow-sensitive
//! [`analysis::TypeAnalyzer`]; [`builder::ProgramBuilder`] is the
//! random-generation entry point mutators and the corpus bootstrap use
//! to grow new programs; [`splicer`] grafts a fragment of one program
//! into another mid-generation; [`lifter`] turns a finished `Program`
//! into executable Lua source text; [`serialize`] turns it into (and
//! back out of) the on-disk `.fzil` format the corpus persists to.

pub mod analysis;
pub mod builder;
pub mod code;
pub mod context;
pub mod environment;
pub mod instruction;
pub mod lifter;
pub mod limits;
pub mod program;
pub mod serialize;
pub mod splicer;
pub mod types;
pub mod validator;
pub mod variable;

pub use code::Code;
pub use context::Context;
pub use environment::Environment;
pub use instruction::{Inouts, Instruction, Operation, OperationDescriptor};
pub use lifter::lift;
pub use program::{Program, ProgramId};
pub use serialize::{deserialize_program, serialize_program, SerializeError};
pub use types::{LuaType, Parameter, Signature, TypeSet};
pub use validator::{Validator, ValidityError};
pub use variable::{Variable, VariableAllocator, VariableLocality};
