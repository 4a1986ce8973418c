//! Constraint trees: the elaborator builds one of these per top-level
//! definition and hands it to `solve::Solver::solve`.

use std::collections::BTreeMap;

use crate::error::{Hint, Region};
use crate::graph::SourceTerm;
use crate::var::Variable;

/// A graph variable together with the source location that introduced it,
/// carried in a `Scheme`'s `header` so the solver can report where a name
/// came from when generalization fails an internal invariant.
#[derive(Clone, Debug)]
pub struct LocatedVariable {
    pub var: Variable,
    pub region: Region,
}

/// One `let`-bound name's polymorphic type, closed over by `generalize`
/// (C4) once its own constraint has been solved.
#[derive(Clone, Debug)]
pub struct Scheme {
    pub rigid_quantifiers: Vec<Variable>,
    pub flex_quantifiers: Vec<Variable>,
    pub constraint: Constraint,
    pub header: BTreeMap<String, LocatedVariable>,
}

/// The constraint language the solver walks.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// Always succeeds; contributes nothing.
    True,
    /// Snapshots the current environment bindings so a later, sibling
    /// `Instance` lookup can find them (`let rec`-style mutual visibility).
    SaveEnv,
    /// Two source terms must denote the same type.
    Equal(Hint, Region, SourceTerm, SourceTerm),
    /// All sub-constraints must hold; failures from every branch accumulate
    /// rather than short-circuiting.
    And(Vec<Constraint>),
    /// Solves each `Scheme` in order (each one's own constraint, then
    /// generalizes it), then solves `body` with every scheme's header bound
    /// in the environment.
    Let(Vec<Scheme>, Box<Constraint>),
    /// Looks `name` up in the environment, instantiates its scheme (or, for
    /// a monomorphic binding, reuses the variable directly), and unifies
    /// the result against `term`.
    Instance(Region, String, SourceTerm),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Content;
    use crate::engine::Engine;
    use rowan::TextRange;

    #[test]
    fn scheme_header_is_keyed_by_name() {
        let mut engine = Engine::new();
        let v = engine.fresh(Content::Flex(None, None));
        let region = TextRange::new(0.into(), 0.into());
        let mut header = BTreeMap::new();
        header.insert("id".to_string(), LocatedVariable { var: v, region });
        assert!(header.contains_key("id"));
    }

    #[test]
    fn and_constraint_holds_a_flat_list() {
        let c = Constraint::And(vec![Constraint::True, Constraint::SaveEnv]);
        assert!(matches!(c, Constraint::And(branches) if branches.len() == 2));
    }
}
