//! Centralized limits and tuning constants for the IR engine.
//!
//! Mirrors the "collect every magic number in one place" convention used
//! for VM tuning constants in the interpreters this crate's builder
//! targets: each constant here protects a specific invariant or bounds a
//! specific resource, named at the point of use.

/// Variable numbers must fit a 16-bit field in the serialized format
/// (§6); the validator rejects any [`crate::Code`] that allocates past
/// this.
pub const MAX_VARIABLES: u32 = u16::MAX as u32;

/// Maximum nesting depth for recursive code generation
/// ([`crate::builder::ProgramBuilder::build_recursive`]). Generation
/// below this remaining budget disables further recursion.
pub const MIN_RECURSIVE_BUDGET: u32 = 5;

/// After this many consecutive no-op build steps, `build(n)` aborts
/// rather than spinning forever on a context with no eligible generator.
pub const MAX_CONSECUTIVE_NOPS: u32 = 10;

/// Threshold used by parameter/return-type synthesis: a type bucket
/// must have at least this many visible variables before it is eligible
/// for sampling as a parameter type.
pub const PARAMETER_BUCKET_THRESHOLD: usize = 3;

/// Probability that a synthesized parameter falls back to `anything`
/// rather than a concrete observed type, to leave room for mutation.
pub const PARAMETER_ANYTHING_PROBABILITY: f64 = 0.20;

/// Minimum number of visible variables `buildPrefix` bootstraps before
/// handing off to ordinary code generators.
pub const PREFIX_MIN_VARIABLES: usize = 5;

/// `randomVariable()` recency bias: probability of picking one of the
/// most recently emitted instruction's outputs.
pub const RECENT_VARIABLE_PROBABILITY: f64 = 0.15;

/// `randomVariable()` inner-scope bias: probability of preferring the
/// innermost active scope over a uniform draw across all visible scopes.
pub const INNER_SCOPE_PROBABILITY: f64 = 0.75;

/// Splicer remap probability for outputs of candidate instructions
/// *outside* the selected slice ("outer" remap target).
pub const SPLICE_REMAP_OUTER_PROBABILITY: f64 = 0.10;

/// Splicer remap probability for outputs of candidate instructions
/// *inside* the selected slice ("inner" remap target).
pub const SPLICE_REMAP_INNER_PROBABILITY: f64 = 0.75;

/// Probability the slice-backward-walk also pulls in instructions that
/// may merely *mutate* (rather than define) a required variable.
pub const SPLICE_INCLUDE_MUTATORS_PROBABILITY: f64 = 0.5;

/// Lower/upper bound of the `U[lo, hi]` fraction of the parent budget
/// handed to a recursive code generator's child block.
pub const RECURSIVE_BUDGET_FRACTION: (f64, f64) = (0.05, 0.50);

/// Default per-sample mutation budget on entry to the corpus.
pub const DEFAULT_CORPUS_MUTATION_BUDGET: u32 = 5;
