//! The payload of one union-find equivalence class, and the shapes a type
//! can take in the graph (§3 of the design: Descriptor, Content, Term).

use std::collections::BTreeMap;

use crate::var::{Mark, Rank, Variable};

/// The "super" kind a `Flex`/`Rigid` variable may be constrained to, before
/// it is ever unified with a concrete structure. Checked in `unify` (C3)
/// whenever such a variable meets a `Structure` whose head constructor must
/// belong to the named family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SuperType {
    Number,
    Comparable,
    Appendable,
    CompAppend,
}

impl SuperType {
    /// Intersects two super-constraints, narrowing to the more specific one
    /// where the families overlap. Returns `None` when the families are
    /// disjoint (e.g. a number can never be appendable).
    pub fn intersect(a: SuperType, b: SuperType) -> Option<SuperType> {
        use SuperType::*;
        Some(match (a, b) {
            (Number, Number) => Number,
            (Comparable, Comparable) => Comparable,
            (Appendable, Appendable) => Appendable,
            (CompAppend, CompAppend) => CompAppend,
            (Number, Comparable) | (Comparable, Number) => Number,
            (Comparable, Appendable) | (Appendable, Comparable) => CompAppend,
            (Comparable, CompAppend) | (CompAppend, Comparable) => CompAppend,
            (Appendable, CompAppend) | (CompAppend, Appendable) => CompAppend,
            (Number, Appendable) | (Appendable, Number) => return None,
            (Number, CompAppend) | (CompAppend, Number) => return None,
        })
    }

    /// Whether a concrete `App1` head constructor belongs to this family.
    /// `List`/`Tuple*` constructors are accepted structurally without
    /// recursing into their element types -- the per-element check would
    /// belong to a fuller constraint system than this core implements.
    pub fn satisfied_by_head(self, head: &str) -> bool {
        match self {
            SuperType::Number => matches!(head, "Int" | "Float"),
            SuperType::Comparable => matches!(
                head,
                "Int" | "Float" | "Char" | "String" | "List" | "Tuple2" | "Tuple3"
            ),
            SuperType::Appendable => matches!(head, "String" | "List"),
            SuperType::CompAppend => matches!(head, "String" | "List"),
        }
    }
}

/// A concrete type constructor application, built from already-allocated
/// sub-`Variable`s (never owned sub-types -- the graph is flat).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// `headConstructor(args...)`, e.g. `List(a)` or `Int` (zero args).
    App1(String, Vec<Variable>),
    /// `arg -> result`.
    Fun1(Variable, Variable),
    /// The empty, closed record `{}`.
    EmptyRecord1,
    /// `{ name: Variable, ... | extensionVariable }`.
    Record1(BTreeMap<String, Variable>, Variable),
}

/// The payload of one equivalence class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    /// An unsolved variable, optionally kinded and optionally named.
    Flex(Option<SuperType>, Option<String>),
    /// A skolem: forbidden from unifying with anything but itself.
    Rigid(Option<SuperType>, Option<String>),
    /// A type alias applied to arguments; `real_var` is the expansion used
    /// for unification and rank purposes.
    Alias(String, Vec<(String, Variable)>, Variable),
    /// A concrete type constructor application.
    Structure(Term),
    /// Installed after an error so downstream unifications degrade
    /// gracefully instead of cascading. `reason` is a short tag such as
    /// `"mismatch"` or `"\u{221e}"` (infinite type) for diagnostics.
    Error(String),
}

/// The full descriptor attached to one equivalence class's representative.
#[derive(Clone, Debug)]
pub struct Descriptor {
    pub content: Content,
    pub rank: Rank,
    pub mark: Mark,
    /// Backpointer used during scheme instantiation to memoize freshly
    /// copied variables so that shared/cyclic structure is copied once.
    /// Always `None` outside of an in-flight `make_instance` call.
    pub copy: Option<Variable>,
}

impl Descriptor {
    pub fn new(content: Content, rank: Rank) -> Self {
        Descriptor {
            content,
            rank,
            mark: Mark::NONE,
            copy: None,
        }
    }
}

// `ena` needs an infallible merge function for its `union`/`union_value`
// entry points. The real merge is always computed by the caller (C3's
// `unify` or C4's `generalize`/`make_instance`) and installed afterwards
// with `set_descriptor`, so this impl is never observed: it exists only to
// satisfy `UnifyValue`'s bound and is never the source of truth.
impl ena::unify::UnifyValue for Descriptor {
    type Error = ena::unify::NoError;

    fn unify_values(_left: &Self, right: &Self) -> Result<Self, Self::Error> {
        Ok(right.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_intersect_same_family() {
        assert_eq!(
            SuperType::intersect(SuperType::Number, SuperType::Number),
            Some(SuperType::Number)
        );
    }

    #[test]
    fn super_intersect_number_narrows_comparable() {
        assert_eq!(
            SuperType::intersect(SuperType::Number, SuperType::Comparable),
            Some(SuperType::Number)
        );
    }

    #[test]
    fn super_intersect_comparable_and_appendable_is_compappend() {
        assert_eq!(
            SuperType::intersect(SuperType::Comparable, SuperType::Appendable),
            Some(SuperType::CompAppend)
        );
    }

    #[test]
    fn super_intersect_number_and_appendable_fails() {
        assert_eq!(SuperType::intersect(SuperType::Number, SuperType::Appendable), None);
    }

    #[test]
    fn number_satisfied_by_int_and_float_only() {
        assert!(SuperType::Number.satisfied_by_head("Int"));
        assert!(SuperType::Number.satisfied_by_head("Float"));
        assert!(!SuperType::Number.satisfied_by_head("String"));
    }
}
