//! C2: Type Graph. Converts an elaborator-facing syntactic type expression
//! into a single graph variable (`flatten`), and renders a graph variable
//! back out to a presentation-layer type for error messages (`to_src_type`).

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::descriptor::{Content, SuperType, Term};
use crate::engine::Engine;
use crate::var::Variable;

/// A syntactic type expression handed in by the elaborator. Leaves may
/// already be allocated `Variable`s (e.g. a binder introduced earlier in
/// the same constraint tree); everything else is flattened into fresh
/// graph nodes registered in the current pool.
#[derive(Clone, Debug)]
pub enum SourceTerm {
    /// An already-allocated variable.
    Var(Variable),
    /// A fresh, unconstrained flex variable (used for e.g. wildcard types).
    Hole,
    App(String, Vec<SourceTerm>),
    Fun(Box<SourceTerm>, Box<SourceTerm>),
    EmptyRecord,
    Record(BTreeMap<String, SourceTerm>, Box<SourceTerm>),
    Alias(String, Vec<(String, SourceTerm)>, Box<SourceTerm>),
}

/// Flattens a `SourceTerm` into a single `Variable` in the current pool,
/// allocating a fresh variable for every constructor application.
pub fn flatten(engine: &mut Engine, term: &SourceTerm) -> Variable {
    match term {
        SourceTerm::Var(v) => *v,
        SourceTerm::Hole => engine.fresh(Content::Flex(None, None)),
        SourceTerm::App(head, args) => {
            let arg_vars = args.iter().map(|a| flatten(engine, a)).collect();
            engine.fresh(Content::Structure(Term::App1(head.clone(), arg_vars)))
        }
        SourceTerm::Fun(param, ret) => {
            let p = flatten(engine, param);
            let r = flatten(engine, ret);
            engine.fresh(Content::Structure(Term::Fun1(p, r)))
        }
        SourceTerm::EmptyRecord => engine.fresh(Content::Structure(Term::EmptyRecord1)),
        SourceTerm::Record(fields, ext) => {
            let field_vars = fields.iter().map(|(k, v)| (k.clone(), flatten(engine, v))).collect();
            let ext_var = flatten(engine, ext);
            engine.fresh(Content::Structure(Term::Record1(field_vars, ext_var)))
        }
        SourceTerm::Alias(name, args, real) => {
            let arg_vars = args
                .iter()
                .map(|(n, a)| (n.clone(), flatten(engine, a)))
                .collect();
            let real_var = flatten(engine, real);
            engine.fresh(Content::Alias(name.clone(), arg_vars, real_var))
        }
    }
}

/// A presentation-layer rendering of a graph variable, suitable for
/// inclusion in error messages. Cycles are replaced by a placeholder rather
/// than causing unbounded recursion; the graph itself is never mutated by
/// this walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceType {
    Var(Option<String>),
    App(String, Vec<SourceType>),
    Fun(Box<SourceType>, Box<SourceType>),
    EmptyRecord,
    Record(BTreeMap<String, SourceType>, Box<SourceType>),
    Alias(String, Vec<(String, SourceType)>, Box<SourceType>),
    Error(String),
    /// Emitted in place of a representative already on the current path,
    /// i.e. a structural cycle.
    SelfReference,
}

pub fn to_src_type(engine: &mut Engine, v: Variable) -> SourceType {
    let mut visiting = FxHashSet::default();
    render(engine, v, &mut visiting)
}

fn render(engine: &mut Engine, v: Variable, visiting: &mut FxHashSet<Variable>) -> SourceType {
    let root = engine.table.find(v);
    if !visiting.insert(root) {
        return SourceType::SelfReference;
    }
    let d = engine.table.descriptor(root);
    let result = match d.content {
        Content::Flex(_, name) | Content::Rigid(_, name) => SourceType::Var(name),
        Content::Error(reason) => SourceType::Error(reason),
        Content::Alias(name, args, real_var) => {
            let rendered_args = args
                .into_iter()
                .map(|(n, a)| (n, render(engine, a, visiting)))
                .collect();
            let rendered_real = render(engine, real_var, visiting);
            SourceType::Alias(name, rendered_args, Box::new(rendered_real))
        }
        Content::Structure(Term::App1(head, vars)) => {
            SourceType::App(head, vars.into_iter().map(|v| render(engine, v, visiting)).collect())
        }
        Content::Structure(Term::Fun1(p, r)) => SourceType::Fun(
            Box::new(render(engine, p, visiting)),
            Box::new(render(engine, r, visiting)),
        ),
        Content::Structure(Term::EmptyRecord1) => SourceType::EmptyRecord,
        Content::Structure(Term::Record1(fields, ext)) => {
            let rendered_fields = fields
                .into_iter()
                .map(|(k, v)| (k, render(engine, v, visiting)))
                .collect();
            let rendered_ext = render(engine, ext, visiting);
            SourceType::Record(rendered_fields, Box::new(rendered_ext))
        }
    };
    visiting.remove(&root);
    result
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Var(Some(name)) => write!(f, "{name}"),
            SourceType::Var(None) => write!(f, "_"),
            SourceType::App(head, args) if args.is_empty() => write!(f, "{head}"),
            SourceType::App(head, args) => {
                write!(f, "{head}")?;
                for a in args {
                    write!(f, " {a}")?;
                }
                Ok(())
            }
            SourceType::Fun(p, r) => write!(f, "({p} -> {r})"),
            SourceType::EmptyRecord => write!(f, "{{}}"),
            SourceType::Record(fields, ext) => {
                write!(f, "{{ ")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} : {v}")?;
                }
                match ext.as_ref() {
                    SourceType::EmptyRecord => write!(f, " }}"),
                    other => write!(f, " | {other} }}"),
                }
            }
            SourceType::Alias(name, _, real) => write!(f, "{name} ({real})"),
            SourceType::Error(reason) => write!(f, "<error: {reason}>"),
            SourceType::SelfReference => write!(f, "<cyclic>"),
        }
    }
}

/// Whether a resolved structure is the closed, empty record -- used by the
/// unifier to reject extending a record that has no extension variable.
pub(crate) fn is_closed_record(engine: &mut Engine, v: Variable) -> bool {
    matches!(
        engine.table.descriptor(engine.table.find(v)).content,
        Content::Structure(Term::EmptyRecord1)
    )
}

/// Whether a flex variable's super-constraint, if any, is satisfied by a
/// concrete `App1` head.
pub(crate) fn head_satisfies(super_type: Option<SuperType>, head: &str) -> bool {
    match super_type {
        None => true,
        Some(s) => s.satisfied_by_head(head),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_allocates_structure_for_app() {
        let mut engine = Engine::new();
        let term = SourceTerm::App("Int".to_string(), vec![]);
        let v = flatten(&mut engine, &term);
        let d = engine.table.descriptor(v);
        assert!(matches!(d.content, Content::Structure(Term::App1(ref h, ref a)) if h == "Int" && a.is_empty()));
    }

    #[test]
    fn flatten_reuses_already_allocated_leaf() {
        let mut engine = Engine::new();
        let existing = engine.fresh(Content::Flex(None, None));
        let v = flatten(&mut engine, &SourceTerm::Var(existing));
        assert_eq!(v, existing);
    }

    #[test]
    fn to_src_type_handles_cycles_with_a_placeholder() {
        let mut engine = Engine::new();
        let a = engine.fresh(Content::Flex(None, None));
        // Force a structural cycle: a's class becomes App("List", [a]).
        engine
            .table
            .set_content(a, Content::Structure(Term::App1("List".to_string(), vec![a])));
        let rendered = to_src_type(&mut engine, a);
        match rendered {
            SourceType::App(head, args) => {
                assert_eq!(head, "List");
                assert_eq!(args, vec![SourceType::SelfReference]);
            }
            other => panic!("expected App(List, [..]), got {other:?}"),
        }
    }
}
