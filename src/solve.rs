//! C5: Solver. Walks a `Constraint` tree, threading the shared `Engine`
//! through unification (C3) and generalization (C4), and accumulates
//! `TypeError`s instead of aborting on the first one -- except for
//! `InternalInvariant`, which is this crate's own contract with itself and
//! always aborts immediately.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::constraint::{Constraint, LocatedVariable, Scheme};
use crate::descriptor::{Content, Term};
use crate::engine::Engine;
use crate::error::{Hint, TypeError};
use crate::graph::{self, SourceType};
use crate::pool;
use crate::unify;
use crate::var::{Variable, NO_RANK};

/// The result of a successful `solve`: the final name -> variable bindings,
/// plus the engine that backs them (needed to render a `SourceType` or
/// instantiate a binding's scheme again later).
pub struct State {
    engine: Engine,
    env: FxHashMap<String, LocatedVariable>,
    saved_env: FxHashMap<String, LocatedVariable>,
}

impl State {
    pub fn variable_of(&self, name: &str) -> Option<Variable> {
        self.env.get(name).map(|located| located.var)
    }

    pub fn type_of(&mut self, name: &str) -> Option<SourceType> {
        let var = self.variable_of(name)?;
        Some(graph::to_src_type(&mut self.engine, var))
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The environment as of the last `SaveEnv` the solve walked through --
    /// a typed snapshot for external consumers, never consulted internally
    /// (an `Instance` that can't find `name` in the live environment fails
    /// rather than falling back to this).
    pub fn saved_env(&self) -> &FxHashMap<String, LocatedVariable> {
        &self.saved_env
    }
}

pub struct Solver {
    engine: Engine,
    env: FxHashMap<String, LocatedVariable>,
    saved_env: FxHashMap<String, LocatedVariable>,
    /// Names an `Instance` may reference even though nothing ever bound them
    /// in `env` -- foreign/kernel primitives the elaborator doesn't route
    /// through a `Let`. Referencing one allocates a fresh, unconstrained
    /// flex variable rather than failing the solve.
    kernel_names: FxHashSet<String>,
    errors: Vec<TypeError>,
}

impl Solver {
    pub fn new() -> Self {
        Solver {
            engine: Engine::new(),
            env: FxHashMap::default(),
            saved_env: FxHashMap::default(),
            kernel_names: FxHashSet::default(),
            errors: Vec::new(),
        }
    }

    /// Starts from a caller-populated environment -- e.g. the types of
    /// builtins the elaborator wants visible to every top-level `Instance`.
    pub fn with_initial_env(env: FxHashMap<String, LocatedVariable>) -> Self {
        Solver {
            engine: Engine::new(),
            env,
            saved_env: FxHashMap::default(),
            kernel_names: FxHashSet::default(),
            errors: Vec::new(),
        }
    }

    /// Registers names that may be referenced by an `Instance` without ever
    /// being `Let`-bound -- foreign primitives the elaborator assumes are
    /// always in scope. Chainable with `with_initial_env`.
    pub fn with_kernel_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.kernel_names.extend(names);
        self
    }

    /// The caller allocates graph variables (via `graph::flatten` or
    /// directly) through this before building the `Constraint` tree that
    /// references them.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn solve(mut self, constraint: &Constraint) -> Result<State, Vec<TypeError>> {
        match self.actually_solve(constraint) {
            Ok(()) => {
                if self.errors.is_empty() {
                    Ok(State {
                        engine: self.engine,
                        env: self.env,
                        saved_env: self.saved_env,
                    })
                } else {
                    Err(self.errors)
                }
            }
            Err(fatal) => Err(vec![fatal]),
        }
    }

    fn actually_solve(&mut self, constraint: &Constraint) -> Result<(), TypeError> {
        match constraint {
            Constraint::True => Ok(()),
            Constraint::SaveEnv => {
                self.saved_env = self.env.clone();
                Ok(())
            }
            Constraint::Equal(hint, region, t1, t2) => {
                let v1 = graph::flatten(&mut self.engine, t1);
                let v2 = graph::flatten(&mut self.engine, t2);
                if let Err(e) = unify::unify(&mut self.engine, hint.clone(), *region, v1, v2) {
                    self.errors.push(e);
                }
                Ok(())
            }
            Constraint::And(branches) => {
                for c in branches {
                    self.actually_solve(c)?;
                }
                Ok(())
            }
            Constraint::Let(schemes, body) => self.solve_let(schemes, body),
            Constraint::Instance(region, name, term) => {
                let instance_var = match self.env.get(name).cloned() {
                    Some(located) => pool::make_instance(&mut self.engine, located.var),
                    None if self.kernel_names.contains(name) => {
                        // A foreign/kernel primitive: not bound by any `Let`,
                        // so there's no scheme to instantiate -- just hand
                        // back a fresh, unconstrained variable for `term` to
                        // unify against.
                        self.engine.fresh(Content::Flex(None, None))
                    }
                    None => {
                        return Err(TypeError::InternalInvariant {
                            message: format!("reference to unbound name `{name}`"),
                        })
                    }
                };
                let term_var = graph::flatten(&mut self.engine, term);
                if let Err(e) = unify::unify(
                    &mut self.engine,
                    Hint::Instance(name.clone()),
                    *region,
                    instance_var,
                    term_var,
                ) {
                    self.errors.push(e);
                }
                Ok(())
            }
        }
    }

    fn solve_let(&mut self, schemes: &[Scheme], body: &Constraint) -> Result<(), TypeError> {
        let mut shadowed = Vec::new();
        for scheme in schemes {
            for name in scheme.header.keys() {
                shadowed.push((name.clone(), self.env.get(name).cloned()));
            }
            self.solve_scheme(scheme)?;
        }
        self.actually_solve(body)?;
        self.check_for_infinite_types(schemes);

        for (name, prior) in shadowed.into_iter().rev() {
            match prior {
                Some(located) => {
                    self.env.insert(name, located);
                }
                None => {
                    self.env.remove(&name);
                }
            }
        }
        Ok(())
    }

    fn solve_scheme(&mut self, scheme: &Scheme) -> Result<(), TypeError> {
        if scheme.rigid_quantifiers.is_empty() && scheme.flex_quantifiers.is_empty() {
            // Nothing to generalize: a plain monomorphic binding. Solving at
            // the current rank (no new pool, no generalize pass) is
            // equivalent and cheaper.
            self.actually_solve(&scheme.constraint)?;
            for (name, located) in &scheme.header {
                self.env.insert(name.clone(), located.clone());
            }
            return Ok(());
        }

        self.engine.enter_next_rank_pool();
        self.actually_solve(&scheme.constraint)?;
        let young = self.engine.leave_pool();
        pool::generalize(&mut self.engine, &young);

        for &q in &scheme.rigid_quantifiers {
            let root = self.engine.table.find(q);
            if self.engine.table.descriptor(root).rank != NO_RANK {
                return Err(TypeError::InternalInvariant {
                    message: "a rigid quantifier escaped its scheme's scope".to_string(),
                });
            }
        }

        for (name, located) in &scheme.header {
            self.env.insert(name.clone(), located.clone());
        }
        Ok(())
    }

    /// Post-`Let`-body occurs check: a scheme's header variables may only
    /// have become cyclic (`x = List(x)`) through unifications performed
    /// while solving `body`, since `unify` never recurses into an
    /// already-bound side -- a dedicated eager occurs check per-bind would
    /// pay for that safety on every unification instead of once per `let`.
    fn check_for_infinite_types(&mut self, schemes: &[Scheme]) {
        for scheme in schemes {
            for (name, located) in &scheme.header {
                let mut visiting = FxHashSet::default();
                if let Some(cyclic_root) = find_cycle(&mut self.engine, located.var, &mut visiting) {
                    let rendering = graph::to_src_type(&mut self.engine, located.var);
                    self.engine
                        .table
                        .set_content(cyclic_root, Content::Error("\u{221e}".to_string()));
                    self.errors.push(TypeError::InfiniteType {
                        name: name.clone(),
                        region: located.region,
                        rendering,
                    });
                }
            }
        }
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

fn find_cycle(engine: &mut Engine, v: Variable, visiting: &mut FxHashSet<Variable>) -> Option<Variable> {
    let root = engine.table.find(v);
    if !visiting.insert(root) {
        return Some(root);
    }
    let content = engine.table.descriptor(root).content.clone();
    let result = match content {
        Content::Flex(..) | Content::Rigid(..) | Content::Error(..) => None,
        Content::Alias(_, args, real) => args
            .iter()
            .find_map(|(_, a)| find_cycle(engine, *a, visiting))
            .or_else(|| find_cycle(engine, real, visiting)),
        Content::Structure(Term::App1(_, vars)) => {
            vars.iter().find_map(|v| find_cycle(engine, *v, visiting))
        }
        Content::Structure(Term::Fun1(a, r)) => {
            find_cycle(engine, a, visiting).or_else(|| find_cycle(engine, r, visiting))
        }
        Content::Structure(Term::EmptyRecord1) => None,
        Content::Structure(Term::Record1(fields, ext)) => fields
            .values()
            .find_map(|v| find_cycle(engine, *v, visiting))
            .or_else(|| find_cycle(engine, ext, visiting)),
    };
    visiting.remove(&root);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SourceTerm;
    use rowan::TextRange;
    use std::collections::BTreeMap;

    fn region() -> crate::error::Region {
        TextRange::new(0.into(), 0.into())
    }

    #[test]
    fn equal_constraint_unifies_its_two_terms() {
        let mut solver = Solver::new();
        let a = solver.engine_mut().fresh(Content::Flex(None, None));
        let int_ty = SourceTerm::App("Int".to_string(), vec![]);
        let constraint = Constraint::Equal(Hint::Equality, region(), SourceTerm::Var(a), int_ty);
        let mut state = solver.solve(&constraint).expect("should solve without errors");
        // `a` isn't bound to any name, so there's nothing in `env` to look
        // up -- this just exercises that a bare `Equal` solves cleanly.
        assert_eq!(state.type_of("never-bound"), None);
    }

    #[test]
    fn let_binding_generalizes_and_instance_gets_fresh_copies() {
        let mut solver = Solver::new();
        let a = solver.engine_mut().fresh(Content::Flex(None, None));
        let id_var = solver
            .engine_mut()
            .fresh(Content::Structure(Term::Fun1(a, a)));

        let mut header = BTreeMap::new();
        header.insert(
            "id".to_string(),
            LocatedVariable {
                var: id_var,
                region: region(),
            },
        );
        let scheme = Scheme {
            rigid_quantifiers: vec![],
            flex_quantifiers: vec![a],
            constraint: Constraint::True,
            header,
        };

        let int_ty = SourceTerm::App("Int".to_string(), vec![]);
        let int_fun = SourceTerm::Fun(Box::new(int_ty.clone()), Box::new(int_ty));
        let body = Constraint::Instance(region(), "id".to_string(), int_fun);

        let constraint = Constraint::Let(vec![scheme], Box::new(body));
        let mut state = solver.solve(&constraint).expect("identity applied at Int should solve");
        assert!(state.type_of("id").is_some());
    }

    #[test]
    fn instance_of_unbound_name_is_an_internal_invariant() {
        let solver = Solver::new();
        let constraint = Constraint::Instance(region(), "nowhere".to_string(), SourceTerm::Hole);
        let result = solver.solve(&constraint);
        assert!(matches!(result, Err(errors) if matches!(errors.as_slice(), [TypeError::InternalInvariant { .. }])));
    }

    #[test]
    fn instance_of_a_kernel_name_gets_a_fresh_unconstrained_variable() {
        let solver = Solver::new().with_kernel_names(["print".to_string()]);
        let constraint = Constraint::Instance(region(), "print".to_string(), SourceTerm::Hole);
        let result = solver.solve(&constraint);
        assert!(result.is_ok());
    }

    #[test]
    fn instance_no_longer_falls_back_to_a_stale_saved_env_snapshot() {
        let mut solver = Solver::new();
        let a = solver.engine_mut().fresh(Content::Flex(None, None));
        let mut header = BTreeMap::new();
        header.insert(
            "tmp".to_string(),
            LocatedVariable {
                var: a,
                region: region(),
            },
        );
        let scheme = Scheme {
            rigid_quantifiers: vec![],
            flex_quantifiers: vec![],
            constraint: Constraint::True,
            header,
        };
        // `tmp` is bound only inside the `Let`; `SaveEnv` snapshots it, but
        // once the `Let` closes it's gone from `env` and must stay gone,
        // even though `saved_env` still remembers it.
        let inner = Constraint::And(vec![Constraint::SaveEnv, Constraint::True]);
        let let_constraint = Constraint::Let(vec![scheme], Box::new(inner));
        let body = Constraint::Instance(region(), "tmp".to_string(), SourceTerm::Hole);
        let constraint = Constraint::And(vec![let_constraint, body]);

        let result = solver.solve(&constraint);
        assert!(matches!(result, Err(errors) if matches!(errors.as_slice(), [TypeError::InternalInvariant { .. }])));
    }

    #[test]
    fn self_referential_let_binding_is_reported_as_infinite() {
        let mut solver = Solver::new();
        let x = solver.engine_mut().fresh(Content::Flex(None, None));
        // Force x = List(x) directly, bypassing unify (which never builds a
        // cycle on its own), to simulate what a buggy/cyclic constraint
        // would produce.
        solver
            .engine_mut()
            .table
            .set_content(x, Content::Structure(Term::App1("List".to_string(), vec![x])));

        let mut header = BTreeMap::new();
        header.insert(
            "x".to_string(),
            LocatedVariable {
                var: x,
                region: region(),
            },
        );
        let scheme = Scheme {
            rigid_quantifiers: vec![],
            flex_quantifiers: vec![],
            constraint: Constraint::True,
            header,
        };
        let constraint = Constraint::Let(vec![scheme], Box::new(Constraint::True));
        let result = solver.solve(&constraint);
        assert!(matches!(
            result,
            Err(errors) if errors.iter().any(|e| matches!(e, TypeError::InfiniteType { name, .. } if name == "x"))
        ));
    }
}
