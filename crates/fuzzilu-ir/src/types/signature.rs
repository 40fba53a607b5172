use std::fmt;

use super::LuaType;
use thiserror::Error;

/// A single function parameter: plain, optional, or a trailing rest
/// parameter. `rest` must be last; `optional` parameters may not
/// precede a `plain` one (enforced by [`Signature::new`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Plain(LuaType),
    Optional(LuaType),
    Rest(LuaType),
}

impl Parameter {
    pub fn ty(&self) -> &LuaType {
        match self {
            Parameter::Plain(t) | Parameter::Optional(t) | Parameter::Rest(t) => t,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("rest parameter at index {0} is not the last parameter")]
    RestNotLast(usize),
    #[error("optional parameter at index {0} precedes a plain parameter")]
    OptionalBeforePlain(usize),
}

/// `(parameterList, returnList)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    parameters: Vec<Parameter>,
    returns: Vec<LuaType>,
}

impl Signature {
    pub fn new(parameters: Vec<Parameter>, returns: Vec<LuaType>) -> Result<Self, SignatureError> {
        let mut seen_plain_after_optional = false;
        let mut optional_seen = false;
        for (i, p) in parameters.iter().enumerate() {
            match p {
                Parameter::Rest(_) if i != parameters.len() - 1 => {
                    return Err(SignatureError::RestNotLast(i));
                }
                Parameter::Optional(_) => optional_seen = true,
                Parameter::Plain(_) => {
                    if optional_seen {
                        seen_plain_after_optional = true;
                    }
                }
                _ => {}
            }
        }
        if seen_plain_after_optional {
            let idx = parameters
                .iter()
                .position(|p| matches!(p, Parameter::Optional(_)))
                .unwrap_or(0);
            return Err(SignatureError::OptionalBeforePlain(idx));
        }
        Ok(Signature { parameters, returns })
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn returns(&self) -> &[LuaType] {
        &self.returns
    }

    /// Result type for the `index`-th output the caller requests,
    /// padding with `undefined` once the signature's return list is
    /// exhausted (spec.md §4.5 "Call result").
    pub fn return_at(&self, index: usize) -> LuaType {
        self.returns
            .get(index)
            .cloned()
            .unwrap_or_else(LuaType::undefined)
    }

    /// `a` subsumes `b` iff they have the same arity shape and every
    /// parameter/return of `a` subsumes the corresponding one of `b`
    /// (contravariant in parameters, covariant in returns would be the
    /// textbook rule; this engine only needs a syntactic comparison
    /// used to decide whether two call sites are interchangeable, so a
    /// simple elementwise subsumption is used both ways).
    pub fn subsumes(&self, other: &Signature) -> bool {
        if self.parameters.len() != other.parameters.len()
            || self.returns.len() != other.returns.len()
        {
            return false;
        }
        self.parameters
            .iter()
            .zip(other.parameters.iter())
            .all(|(a, b)| std::mem::discriminant(a) == std::mem::discriminant(b) && a.ty().subsumes(b.ty()))
            && self
                .returns
                .iter()
                .zip(other.returns.iter())
                .all(|(a, b)| a.subsumes(b))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match p {
                Parameter::Plain(t) => write!(f, "{t}")?,
                Parameter::Optional(t) => write!(f, "{t}?")?,
                Parameter::Rest(t) => write!(f, "...{t}")?,
            }
        }
        write!(f, ") -> (")?;
        for (i, t) in self.returns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, ")")
    }
}
