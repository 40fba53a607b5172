//! Forward passes over a [`crate::code::Code`]. The four in
//! `context_analyzer`/`scope_analyzer`/`def_use_analyzer`/`dead_code_analyzer`
//! are flow-insensitive: each instruction's contribution depends only on
//! instructions before it, never on a branch taken. [`TypeAnalyzer`] is
//! flow-sensitive and is the odd one out, with its own module doc.

mod context_analyzer;
mod dead_code_analyzer;
mod def_use_analyzer;
mod scope_analyzer;
mod type_analyzer;

pub use context_analyzer::ContextAnalyzer;
pub use dead_code_analyzer::DeadCodeAnalyzer;
pub use def_use_analyzer::DefUseAnalyzer;
pub use scope_analyzer::ScopeAnalyzer;
pub use type_analyzer::TypeAnalyzer;
