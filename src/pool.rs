//! C4: Pool & Rank Engine. Tracks which variables were introduced at which
//! `let`-nesting depth, and performs the generalization pass that promotes
//! variables into a scheme's quantifiers (§4.4) plus scheme instantiation
//! (`make_instance`, §4.4's "Instantiation").

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::descriptor::{Content, Term};
use crate::engine::Engine;
use crate::var::{Mark, Rank, Variable, NO_RANK};

/// All variables introduced while solving at binder depth `rank`.
#[derive(Debug)]
pub struct Pool {
    pub rank: Rank,
    pub inhabitants: Vec<Variable>,
}

impl Pool {
    pub fn new(rank: Rank) -> Self {
        Pool {
            rank,
            inhabitants: Vec::new(),
        }
    }
}

/// Promotes variables in `young_pool` that really belong to an outer pool
/// back into it, and turns the remaining flex variables into quantifiers of
/// the scheme being closed (rank set to `NO_RANK`).
///
/// Must be called with `engine`'s current pool already switched back to the
/// pool enclosing `young_pool` (i.e. after `Engine::leave_pool`).
pub fn generalize(engine: &mut Engine, young_pool: &Pool) {
    let young_mark = engine.fresh_mark();
    let mut rank_buckets: BTreeMap<Rank, Vec<Variable>> = BTreeMap::new();

    for &v in &young_pool.inhabitants {
        let root = engine.table.find(v);
        if engine.table.redundant(root) {
            // `find` already returns the root, so this can't happen, but
            // mirrors the spec's "still-non-redundant" phrasing defensively.
            continue;
        }
        let mut d = engine.table.descriptor(root);
        d.mark = young_mark;
        let rank = d.rank;
        engine.table.set_descriptor(root, d);
        rank_buckets.entry(rank).or_default().push(root);
    }

    let visited_mark = engine.fresh_mark();
    // Ascending rank order: by the time a higher bucket's traversal reaches
    // a lower-rank variable, that variable is already finalized.
    for (&bucket_rank, vars) in rank_buckets.iter() {
        for &v in vars {
            adjust_rank(engine, young_mark, visited_mark, bucket_rank, v);
        }
    }

    for (&bucket_rank, vars) in rank_buckets.iter() {
        if bucket_rank < young_pool.rank {
            for &v in vars {
                if !engine.table.redundant(v) {
                    engine.register(v);
                }
            }
            continue;
        }
        // bucket_rank == young_pool.rank (ranks can't exceed the pool that
        // introduced them, invariant 2).
        for &v in vars {
            if engine.table.redundant(v) {
                continue;
            }
            let final_rank = engine.table.descriptor(v).rank;
            if final_rank < young_pool.rank {
                engine.register(v);
            } else {
                // Rigidify: mark as a generalized quantifier of the scheme
                // being closed. Content is left as-is -- a `Flex` reads as
                // "a generalizable variable" purely by virtue of its rank.
                engine.table.set_rank(v, NO_RANK);
            }
        }
    }
}

/// Lowers `v`'s rank so that ranks never increase along reachability, per
/// the three-way dispatch in spec §4.4. Mutates the descriptor's rank (and
/// mark) and returns the finalized rank.
fn adjust_rank(
    engine: &mut Engine,
    young_mark: Mark,
    visited_mark: Mark,
    bucket_rank: Rank,
    v: Variable,
) -> Rank {
    let root = engine.table.find(v);
    let d = engine.table.descriptor(root);

    if d.mark == young_mark {
        // Mark visited before recursing: the graph may be cyclic under a
        // buggy program (an `Error("\u{221e}")` sentinel notwithstanding),
        // and marking first turns a would-be infinite recursion into a
        // harmless self-reference that resolves to `bucket_rank`.
        engine.table.modify_descriptor(root, |mut d| {
            d.mark = visited_mark;
            d
        });
        let computed = adjust_rank_content(engine, young_mark, visited_mark, bucket_rank, &d.content);
        engine.table.set_rank(root, computed);
        computed
    } else if d.mark != visited_mark {
        let computed = bucket_rank.min(d.rank);
        engine.table.modify_descriptor(root, |mut d| {
            d.rank = computed;
            d.mark = visited_mark;
            d
        });
        computed
    } else {
        d.rank
    }
}

fn adjust_rank_content(
    engine: &mut Engine,
    young_mark: Mark,
    visited_mark: Mark,
    bucket_rank: Rank,
    content: &Content,
) -> Rank {
    match content {
        Content::Error(_) | Content::Flex(..) | Content::Rigid(..) => bucket_rank,
        Content::Alias(_, args, real_var) => {
            // Open question in spec §9: recurse through both the
            // arguments and the expansion (the conservative choice).
            let mut rank = adjust_rank(engine, young_mark, visited_mark, bucket_rank, *real_var);
            for (_, arg) in args {
                let arg_rank = adjust_rank(engine, young_mark, visited_mark, bucket_rank, *arg);
                rank = rank.max(arg_rank);
            }
            rank
        }
        Content::Structure(Term::App1(_, vars)) => {
            if vars.is_empty() {
                bucket_rank
            } else {
                vars.iter()
                    .map(|v| adjust_rank(engine, young_mark, visited_mark, bucket_rank, *v))
                    .max()
                    .unwrap_or(bucket_rank)
            }
        }
        Content::Structure(Term::Fun1(a, r)) => {
            let ra = adjust_rank(engine, young_mark, visited_mark, bucket_rank, *a);
            let rr = adjust_rank(engine, young_mark, visited_mark, bucket_rank, *r);
            ra.max(rr)
        }
        Content::Structure(Term::EmptyRecord1) => crate::var::OUTERMOST_RANK,
        Content::Structure(Term::Record1(fields, ext)) => {
            let mut rank = adjust_rank(engine, young_mark, visited_mark, bucket_rank, *ext);
            for v in fields.values() {
                let field_rank = adjust_rank(engine, young_mark, visited_mark, bucket_rank, *v);
                rank = rank.max(field_rank);
            }
            rank
        }
    }
}

/// Produces a fresh copy of a generalized scheme variable: every reachable
/// class with `rank == NO_RANK` is copied into a fresh variable at the
/// current rank; everything else (still tied to some enclosing pool) is
/// reused as-is. Memoizes via `Descriptor::copy` so shared/cyclic structure
/// is copied exactly once, then clears every touched `copy` slot.
pub fn make_instance(engine: &mut Engine, scheme_var: Variable) -> Variable {
    let mut touched = Vec::new();
    let result = copy_var(engine, scheme_var, &mut touched);
    let mut cleared: FxHashSet<Variable> = FxHashSet::default();
    for root in touched {
        if cleared.insert(root) {
            engine.table.modify_descriptor(root, |mut d| {
                d.copy = None;
                d
            });
        }
    }
    result
}

fn copy_var(engine: &mut Engine, v: Variable, touched: &mut Vec<Variable>) -> Variable {
    let root = engine.table.find(v);
    let d = engine.table.descriptor(root);
    if d.rank != NO_RANK {
        return root;
    }
    if let Some(copy) = d.copy {
        return copy;
    }

    match d.content.clone() {
        Content::Flex(super_, name) | Content::Rigid(super_, name) => {
            // A generalized quantifier always instantiates to a fresh,
            // flexible variable -- that's the entire point of `let`
            // polymorphism: each use site gets an independently unifiable
            // copy, whether the scheme's own body treated it as rigid or not.
            let fresh = engine.fresh(Content::Flex(super_, name));
            touched.push(root);
            engine.table.modify_descriptor(root, |mut d| {
                d.copy = Some(fresh);
                d
            });
            fresh
        }
        Content::Error(reason) => {
            let fresh = engine.fresh(Content::Error(reason));
            touched.push(root);
            engine.table.modify_descriptor(root, |mut d| {
                d.copy = Some(fresh);
                d
            });
            fresh
        }
        Content::Alias(name, args, real_var) => {
            // Allocate the new identity before recursing so a cyclic
            // reference back to `root` resolves to this same copy.
            let placeholder = engine.fresh(Content::Error("instantiating".to_string()));
            touched.push(root);
            engine.table.modify_descriptor(root, |mut d| {
                d.copy = Some(placeholder);
                d
            });
            let new_args: Vec<(String, Variable)> = args
                .into_iter()
                .map(|(n, a)| (n, copy_var(engine, a, touched)))
                .collect();
            let new_real = copy_var(engine, real_var, touched);
            engine
                .table
                .set_content(placeholder, Content::Alias(name, new_args, new_real));
            placeholder
        }
        Content::Structure(term) => {
            let placeholder = engine.fresh(Content::Error("instantiating".to_string()));
            touched.push(root);
            engine.table.modify_descriptor(root, |mut d| {
                d.copy = Some(placeholder);
                d
            });
            let new_term = match term {
                Term::App1(head, vars) => Term::App1(
                    head,
                    vars.into_iter().map(|v| copy_var(engine, v, touched)).collect(),
                ),
                Term::Fun1(a, r) => {
                    Term::Fun1(copy_var(engine, a, touched), copy_var(engine, r, touched))
                }
                Term::EmptyRecord1 => Term::EmptyRecord1,
                Term::Record1(fields, ext) => {
                    let new_fields = fields
                        .into_iter()
                        .map(|(k, v)| (k, copy_var(engine, v, touched)))
                        .collect();
                    let new_ext = copy_var(engine, ext, touched);
                    Term::Record1(new_fields, new_ext)
                }
            };
            engine.table.set_content(placeholder, Content::Structure(new_term));
            placeholder
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SuperType;
    use crate::var::OUTERMOST_RANK;

    fn flex_var(engine: &mut Engine) -> Variable {
        engine.fresh(Content::Flex(None, None))
    }

    #[test]
    fn generalize_promotes_inner_flex_to_no_rank() {
        let mut engine = Engine::new();
        engine.enter_next_rank_pool();
        let a = flex_var(&mut engine);
        let young = engine.leave_pool();

        assert_eq!(engine.current_rank(), OUTERMOST_RANK);
        generalize(&mut engine, &young);

        assert_eq!(engine.table.descriptor(a).rank, NO_RANK);
    }

    #[test]
    fn generalize_demotes_variable_shared_with_outer_pool() {
        let mut engine = Engine::new();
        let outer = flex_var(&mut engine); // rank 0

        engine.enter_next_rank_pool();
        // `outer` is reachable from inside the function type built at the
        // inner rank, but was allocated at rank 0, so it must not be
        // generalized away.
        let inner = engine.fresh(Content::Structure(Term::Fun1(outer, outer)));
        engine.register(inner);
        let young = engine.leave_pool();

        generalize(&mut engine, &young);
        assert_eq!(engine.table.descriptor(outer).rank, OUTERMOST_RANK);
    }

    #[test]
    fn make_instance_produces_a_fresh_disjoint_copy() {
        let mut engine = Engine::new();
        engine.enter_next_rank_pool();
        let a = flex_var(&mut engine);
        let fun = engine.fresh(Content::Structure(Term::Fun1(a, a)));
        engine.register(fun);
        let young = engine.leave_pool();
        generalize(&mut engine, &young);

        let copy1 = make_instance(&mut engine, fun);
        let copy2 = make_instance(&mut engine, fun);
        assert_ne!(copy1, copy2);

        // both copies keep the `arg == result` sharing from the scheme
        if let Content::Structure(Term::Fun1(p, r)) = engine.table.descriptor(copy1).content {
            assert_eq!(engine.table.find(p), engine.table.find(r));
        } else {
            panic!("expected a function type");
        }

        // copy slots are cleared after instantiation
        assert!(engine.table.descriptor(fun).copy.is_none());
        assert!(engine.table.descriptor(a).copy.is_none());
    }

    #[test]
    fn make_instance_reuses_super_constrained_quantifier() {
        let mut engine = Engine::new();
        engine.enter_next_rank_pool();
        let a = engine.fresh(Content::Flex(Some(SuperType::Number), None));
        let young = engine.leave_pool();
        generalize(&mut engine, &young);

        let copy = make_instance(&mut engine, a);
        assert_ne!(copy, a);
        assert!(matches!(
            engine.table.descriptor(copy).content,
            Content::Flex(Some(SuperType::Number), _)
        ));
    }
}
