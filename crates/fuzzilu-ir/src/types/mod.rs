//! The type lattice: a `(definite, possible)` bitset pair plus an
//! optional extension describing object shape, used by the type
//! analyzer (flow-sensitive inference) and the builder (variable
//! selection by static type).

mod signature;
mod type_set;

pub use signature::{Parameter, Signature, SignatureError};
pub use type_set::TypeSet;

use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Either a plain type or a callable signature, used for the
/// `additional: name -> Type|Signature` map on table-like extensions
/// (e.g. a table whose `sort` field is itself a function).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeOrSignature {
    Type(LuaType),
    Signature(Rc<Signature>),
}

/// Object-shape refinement attached to a [`LuaType`] whose possible set
/// includes `OBJECT`, `FUNCTION`, or `ITERABLE`. Extensions are
/// immutable and commonly shared by `Rc` — identity comparison is a
/// fast-path before structural comparison in `union`/`intersection`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeExtension {
    pub group: Option<SmolStr>,
    pub array_type: Option<Rc<LuaType>>,
    pub properties: BTreeSet<SmolStr>,
    pub methods: BTreeSet<SmolStr>,
    pub additional: BTreeMap<SmolStr, TypeOrSignature>,
    pub signature: Option<Rc<Signature>>,
}

impl TypeExtension {
    fn is_empty(&self) -> bool {
        self.group.is_none()
            && self.array_type.is_none()
            && self.properties.is_empty()
            && self.methods.is_empty()
            && self.additional.is_empty()
            && self.signature.is_none()
    }
}

/// `(definite, possible)` with `definite ⊆ possible`. `definite` is
/// what a value *must* be; `possible` is what it *might* be. The empty
/// type (`nothing`) has `possible = ∅`; the universal type (`anything`)
/// has `definite = ∅, possible = ANYTHING`.
#[derive(Debug, Clone, PartialEq)]
pub struct LuaType {
    definite: TypeSet,
    possible: TypeSet,
    extension: Option<Rc<TypeExtension>>,
}

impl LuaType {
    fn new(definite: TypeSet, possible: TypeSet, extension: Option<Rc<TypeExtension>>) -> Self {
        debug_assert!(
            possible.contains(definite),
            "definite {:?} must be a subset of possible {:?}",
            definite,
            possible
        );
        LuaType {
            definite,
            possible,
            extension,
        }
    }

    pub fn plain(set: TypeSet) -> Self {
        LuaType::new(set, set, None)
    }

    /// Rebuild a bare `(definite, possible)` pair with no extension.
    /// Used by [`crate::serialize`], which drops object-shape extensions
    /// across a round trip — a deserialized program's types are as
    /// precise as the base lattice but forget property/method/signature
    /// refinements, which the type analyzer is free to re-derive.
    pub fn from_parts(definite: TypeSet, possible: TypeSet) -> Self {
        LuaType::new(definite, possible, None)
    }

    pub fn nothing() -> Self {
        LuaType::new(TypeSet::NOTHING, TypeSet::NOTHING, None)
    }

    pub fn anything() -> Self {
        LuaType::new(TypeSet::NOTHING, TypeSet::ANYTHING, None)
    }

    pub fn undefined() -> Self {
        LuaType::plain(TypeSet::UNDEFINED)
    }

    pub fn nil() -> Self {
        LuaType::plain(TypeSet::NIL)
    }

    pub fn boolean() -> Self {
        LuaType::plain(TypeSet::BOOLEAN)
    }

    pub fn integer() -> Self {
        LuaType::plain(TypeSet::INTEGER)
    }

    pub fn float() -> Self {
        LuaType::plain(TypeSet::FLOAT)
    }

    /// `integer | float`, definitely neither on its own — a variable
    /// typed plainly `integer()` or `float()` is still subsumed by this,
    /// unlike `plain(NUMBER)` which would demand `definite == NUMBER`.
    pub fn number() -> Self {
        LuaType::new(TypeSet::NOTHING, TypeSet::NUMBER, None)
    }

    pub fn string() -> Self {
        LuaType::plain(TypeSet::STRING)
    }

    pub fn function(signature: Signature) -> Self {
        LuaType::new(
            TypeSet::FUNCTION,
            TypeSet::FUNCTION,
            Some(Rc::new(TypeExtension {
                signature: Some(Rc::new(signature)),
                ..Default::default()
            })),
        )
    }

    pub fn object(group: Option<SmolStr>) -> Self {
        let ext = TypeExtension {
            group,
            ..Default::default()
        };
        LuaType::new(
            TypeSet::OBJECT,
            TypeSet::OBJECT,
            if ext.is_empty() { None } else { Some(Rc::new(ext)) },
        )
    }

    pub fn definite(&self) -> TypeSet {
        self.definite
    }

    pub fn possible(&self) -> TypeSet {
        self.possible
    }

    pub fn extension(&self) -> Option<&TypeExtension> {
        self.extension.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.extension().and_then(|e| e.group.as_deref())
    }

    pub fn is_nothing(&self) -> bool {
        self.possible.is_empty()
    }

    pub fn is_anything(&self) -> bool {
        self.definite.is_empty() && self.possible == TypeSet::ANYTHING
    }

    /// True iff this type's possible set is exactly one base type bit
    /// — i.e. it is not itself an alternation of several base types.
    /// `merging` refuses to combine two such alternations.
    fn is_union(&self) -> bool {
        self.possible.bits().count_ones() > 1
    }

    /// Shorthand used by variable selection: is `self` statically known
    /// to satisfy `required`? True iff `required` subsumes `self`.
    pub fn is(&self, required: &LuaType) -> bool {
        required.subsumes(self)
    }

    /// Widen: used by the type analyzer to merge sibling branch types
    /// after an if/else (or any conditional-group) exit. `possible`
    /// expands to the union of both branches; `definite` collapses to
    /// their intersection, since only what both branches guarantee can
    /// still be guaranteed afterwards.
    pub fn union(&self, other: &LuaType) -> LuaType {
        if self == other {
            return self.clone();
        }
        if self.is_anything() || other.is_anything() {
            return LuaType::anything();
        }
        if self.is_nothing() {
            return other.clone();
        }
        if other.is_nothing() {
            return self.clone();
        }
        let definite = self.definite & other.definite;
        let possible = self.possible | other.possible;
        let extension = match (&self.extension, &other.extension) {
            (Some(a), Some(b)) if Rc::ptr_eq(a, b) => Some(Rc::clone(a)),
            (Some(a), Some(b)) => {
                let group = if a.group == b.group { a.group.clone() } else { None };
                let signature = match (&a.signature, &b.signature) {
                    (Some(sa), Some(sb)) if sa.subsumes(sb) => Some(Rc::clone(sa)),
                    (Some(sa), Some(sb)) if sb.subsumes(sa) => Some(Rc::clone(sb)),
                    _ => None,
                };
                let ext = TypeExtension {
                    group,
                    array_type: if a.array_type == b.array_type { a.array_type.clone() } else { None },
                    properties: a.properties.intersection(&b.properties).cloned().collect(),
                    methods: a.methods.intersection(&b.methods).cloned().collect(),
                    additional: BTreeMap::new(),
                    signature,
                };
                if ext.is_empty() { None } else { Some(Rc::new(ext)) }
            }
            _ => None,
        };
        LuaType::new(definite, possible, extension)
    }

    /// Narrow: `nothing` if the two types' definite sets are mutually
    /// incomparable (a direct contradiction, e.g. definitely-integer
    /// vs. definitely-string); otherwise `definite` becomes the union
    /// (the more specific guarantee) and `possible` the intersection.
    pub fn intersection(&self, other: &LuaType) -> LuaType {
        if self == other {
            return self.clone();
        }
        if self.is_anything() {
            return other.clone();
        }
        if other.is_anything() {
            return self.clone();
        }
        let comparable = self.definite.contains(other.definite) || other.definite.contains(self.definite);
        if !comparable {
            return LuaType::nothing();
        }
        let possible = self.possible & other.possible;
        if possible.is_empty() {
            return LuaType::nothing();
        }
        let definite = self.definite | other.definite;
        if let (Some(sig_a), Some(sig_b)) = (
            self.extension.as_ref().and_then(|e| e.signature.as_ref()),
            other.extension.as_ref().and_then(|e| e.signature.as_ref()),
        ) {
            if !sig_a.subsumes(sig_b) && !sig_b.subsumes(sig_a) {
                return LuaType::nothing();
            }
        }
        let extension = match (&self.extension, &other.extension) {
            (Some(a), Some(b)) if Rc::ptr_eq(a, b) => Some(Rc::clone(a)),
            (Some(a), Some(b)) => {
                let ext = TypeExtension {
                    group: a.group.clone().or_else(|| b.group.clone()),
                    array_type: a.array_type.clone().or_else(|| b.array_type.clone()),
                    properties: a.properties.union(&b.properties).cloned().collect(),
                    methods: a.methods.union(&b.methods).cloned().collect(),
                    additional: {
                        let mut m = a.additional.clone();
                        m.extend(b.additional.clone());
                        m
                    },
                    signature: a.signature.clone().or_else(|| b.signature.clone()),
                };
                Some(Rc::new(ext))
            }
            (Some(a), None) => Some(Rc::clone(a)),
            (None, Some(b)) => Some(Rc::clone(b)),
            (None, None) => None,
        };
        LuaType::new(definite, possible, extension)
    }

    /// Form a value that is simultaneously both types (e.g. a table
    /// literal gaining a property after construction). Forbidden
    /// between alternations (`possible` spanning more than one base
    /// type bit) and between mutually non-subsuming signatures.
    pub fn merging(&self, other: &LuaType) -> Option<LuaType> {
        if self.is_union() || other.is_union() {
            return None;
        }
        if let (Some(sig_a), Some(sig_b)) = (
            self.extension.as_ref().and_then(|e| e.signature.as_ref()),
            other.extension.as_ref().and_then(|e| e.signature.as_ref()),
        ) {
            if !sig_a.subsumes(sig_b) && !sig_b.subsumes(sig_a) {
                return None;
            }
        }
        let definite = self.definite | other.definite;
        let possible = self.possible | other.possible;
        let extension = match (&self.extension, &other.extension) {
            (Some(a), Some(b)) => {
                let mut additional = a.additional.clone();
                additional.extend(b.additional.clone());
                Some(Rc::new(TypeExtension {
                    group: a.group.clone().or_else(|| b.group.clone()),
                    array_type: a.array_type.clone().or_else(|| b.array_type.clone()),
                    properties: a.properties.union(&b.properties).cloned().collect(),
                    methods: a.methods.union(&b.methods).cloned().collect(),
                    additional,
                    signature: a.signature.clone().or_else(|| b.signature.clone()),
                }))
            }
            (Some(a), None) => Some(Rc::clone(a)),
            (None, Some(b)) => Some(Rc::clone(b)),
            (None, None) => None,
        };
        Some(LuaType::new(definite, possible, extension))
    }

    /// `self.subsumes(other)`: true iff every value of type `other` is
    /// also a value of type `self`. Equivalent to `other.possible ⊆
    /// self.possible && self.definite ⊆ other.definite`, plus
    /// extension-level rules (group match-or-nil, property/method
    /// subset on the subsumed side, signature subsumption).
    pub fn subsumes(&self, other: &LuaType) -> bool {
        if other.is_nothing() {
            return true;
        }
        if self.is_anything() {
            return true;
        }
        if self == other {
            return true;
        }
        if !self.possible.contains(other.possible) {
            return false;
        }
        if !other.definite.contains(self.definite) {
            return false;
        }
        match (&self.extension, &other.extension) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => {
                if a.group.is_some() && a.group != b.group {
                    return false;
                }
                if !a.properties.is_subset(&b.properties) {
                    return false;
                }
                if !a.methods.is_subset(&b.methods) {
                    return false;
                }
                match (&a.signature, &b.signature) {
                    (Some(sa), Some(sb)) => sa.subsumes(sb),
                    (Some(_), None) => false,
                    _ => true,
                }
            }
        }
    }

    pub fn adding_property(&self, name: impl Into<SmolStr>, ty: LuaType) -> LuaType {
        let mut ext = self.extension.as_deref().cloned().unwrap_or_default();
        let name = name.into();
        ext.properties.insert(name.clone());
        ext.additional.insert(name, TypeOrSignature::Type(ty));
        let mut result = self.clone();
        result.possible |= TypeSet::OBJECT;
        result.extension = Some(Rc::new(ext));
        result
    }

    pub fn removing_property(&self, name: &str) -> LuaType {
        let mut result = self.clone();
        if let Some(ext) = &self.extension {
            let mut ext = (**ext).clone();
            ext.properties.remove(name);
            ext.additional.remove(name);
            result.extension = if ext.is_empty() { None } else { Some(Rc::new(ext)) };
        }
        result
    }

    pub fn adding_method(&self, name: impl Into<SmolStr>, signature: Signature) -> LuaType {
        let mut ext = self.extension.as_deref().cloned().unwrap_or_default();
        let name = name.into();
        ext.methods.insert(name.clone());
        ext.additional
            .insert(name, TypeOrSignature::Signature(Rc::new(signature)));
        let mut result = self.clone();
        result.possible |= TypeSet::OBJECT;
        result.extension = Some(Rc::new(ext));
        result
    }

    pub fn removing_method(&self, name: &str) -> LuaType {
        let mut result = self.clone();
        if let Some(ext) = &self.extension {
            let mut ext = (**ext).clone();
            ext.methods.remove(name);
            ext.additional.remove(name);
            result.extension = if ext.is_empty() { None } else { Some(Rc::new(ext)) };
        }
        result
    }

    pub fn adding_index(&self, element_type: LuaType) -> LuaType {
        let mut ext = self.extension.as_deref().cloned().unwrap_or_default();
        ext.array_type = Some(Rc::new(element_type));
        let mut result = self.clone();
        result.possible |= TypeSet::OBJECT | TypeSet::ITERABLE;
        result.extension = Some(Rc::new(ext));
        result
    }

    pub fn type_of_property(&self, name: &str) -> Option<LuaType> {
        self.extension.as_ref().and_then(|e| match e.additional.get(name) {
            Some(TypeOrSignature::Type(t)) => Some(t.clone()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_commutative_and_idempotent() {
        let a = LuaType::integer();
        let b = LuaType::string();
        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn anything_and_nothing_are_union_identities() {
        let t = LuaType::string();
        assert_eq!(t.union(&LuaType::nothing()), t);
        assert_eq!(t.union(&LuaType::anything()), LuaType::anything());
    }

    #[test]
    fn subsumption_is_reflexive_and_transitive() {
        let integer = LuaType::integer();
        let number = LuaType::number();
        let anything = LuaType::anything();
        assert!(integer.subsumes(&integer));
        assert!(number.subsumes(&integer));
        assert!(anything.subsumes(&number));
        assert!(anything.subsumes(&integer));
    }

    #[test]
    fn number_subsumes_both_integer_and_float_but_not_the_reverse() {
        let number = LuaType::number();
        assert!(number.subsumes(&LuaType::integer()));
        assert!(number.subsumes(&LuaType::float()));
        assert!(!LuaType::integer().subsumes(&number));
    }

    #[test]
    fn intersection_distributes_over_incomparable_definites() {
        assert_eq!(LuaType::integer().intersection(&LuaType::string()), LuaType::nothing());
        let number = LuaType::number();
        assert_eq!(number.intersection(&LuaType::integer()), LuaType::integer());
        assert_eq!(LuaType::anything().intersection(&number), number);
    }

    #[test]
    fn adding_property_is_visible_through_type_of_property_and_subsumption() {
        let base = LuaType::object(None);
        let withprop = base.adding_property("x", LuaType::integer());
        assert_eq!(withprop.type_of_property("x"), Some(LuaType::integer()));
        assert!(base.subsumes(&withprop));
        assert!(!withprop.subsumes(&base));
        let removed = withprop.removing_property("x");
        assert_eq!(removed.type_of_property("x"), None);
    }
}

impl fmt::Display for LuaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nothing() {
            return write!(f, "nothing");
        }
        if self.is_anything() {
            return write!(f, "anything");
        }
        let names = [
            (TypeSet::UNDEFINED, "undefined"),
            (TypeSet::NIL, "nil"),
            (TypeSet::BOOLEAN, "boolean"),
            (TypeSet::INTEGER, "integer"),
            (TypeSet::FLOAT, "float"),
            (TypeSet::STRING, "string"),
            (TypeSet::OBJECT, "object"),
            (TypeSet::FUNCTION, "function"),
            (TypeSet::ITERABLE, "iterable"),
        ];
        let parts: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.possible.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", parts.join(" | "))
    }
}
