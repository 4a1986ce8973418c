//! C3: Unifier. `unify` is the only code path above `table::UnionFind`
//! allowed to call `union` -- every other writer in this crate only ever
//! overwrites a descriptor that's already part of a singleton class.

use std::collections::BTreeMap;

use crate::descriptor::{Content, Descriptor, SuperType, Term};
use crate::engine::Engine;
use crate::error::{Hint, Region, TypeError};
use crate::graph::to_src_type;
use crate::var::{Rank, Variable, NO_RANK};

/// Makes `v1` and `v2`'s classes denote the same type.
///
/// Every failing arm installs an `Error` sentinel on the combined class
/// before returning `Err`, so later unifications touching either variable
/// see `Error` and propagate silently (§7's policy) rather than cascading
/// into further, less useful errors.
pub fn unify(
    engine: &mut Engine,
    hint: Hint,
    region: Region,
    v1: Variable,
    v2: Variable,
) -> Result<(), TypeError> {
    let r1 = engine.table.find(v1);
    let r2 = engine.table.find(v2);
    if r1 == r2 {
        return Ok(());
    }

    let d1 = engine.table.descriptor(r1);
    let d2 = engine.table.descriptor(r2);
    let rank = merge_rank(d1.rank, d2.rank);

    match (d1.content, d2.content) {
        (Content::Error(reason), _) | (_, Content::Error(reason)) => {
            bind(engine, r1, r2, Content::Error(reason), rank);
            Ok(())
        }

        (Content::Flex(s1, n1), Content::Flex(s2, n2)) => {
            let merged_super = match (s1, s2) {
                (None, None) => None,
                (Some(s), None) | (None, Some(s)) => Some(s),
                (Some(a), Some(b)) => match SuperType::intersect(a, b) {
                    Some(s) => Some(s),
                    None => return fail_mismatch(engine, hint, region, r1, r2, rank),
                },
            };
            let name = n1.or(n2);
            bind(engine, r1, r2, Content::Flex(merged_super, name), rank);
            Ok(())
        }

        (Content::Flex(flex_super, _), Content::Rigid(rigid_super, rigid_name))
        | (Content::Rigid(rigid_super, rigid_name), Content::Flex(flex_super, _)) => {
            if let (Some(fs), Some(rs)) = (flex_super, rigid_super) {
                if SuperType::intersect(fs, rs).is_none() {
                    return fail_mismatch(engine, hint, region, r1, r2, rank);
                }
            }
            bind(engine, r1, r2, Content::Rigid(rigid_super, rigid_name), rank);
            Ok(())
        }

        // `r1 == r2` was already ruled out above, so two `Rigid`s here are
        // necessarily distinct skolems: they can never unify.
        (Content::Rigid(..), Content::Rigid(..)) => fail_mismatch(engine, hint, region, r1, r2, rank),

        (Content::Flex(_, _), Content::Alias(name, args, real))
        | (Content::Alias(name, args, real), Content::Flex(_, _)) => {
            // An alias carries no head constructor to check a super-kind
            // against, so the flex variable just gets bound to it.
            bind(engine, r1, r2, Content::Alias(name, args, real), rank);
            Ok(())
        }

        (Content::Rigid(..), Content::Alias(..)) | (Content::Alias(..), Content::Rigid(..)) => {
            fail_mismatch(engine, hint, region, r1, r2, rank)
        }

        (Content::Flex(flex_super, _), Content::Structure(term)) => {
            if let Err(e) = check_super(engine, &hint, region, flex_super, &term, r2) {
                bind(engine, r1, r2, Content::Error("bad-kind".to_string()), rank);
                return Err(e);
            }
            bind(engine, r1, r2, Content::Structure(term), rank);
            Ok(())
        }
        (Content::Structure(term), Content::Flex(flex_super, _)) => {
            if let Err(e) = check_super(engine, &hint, region, flex_super, &term, r1) {
                bind(engine, r1, r2, Content::Error("bad-kind".to_string()), rank);
                return Err(e);
            }
            bind(engine, r1, r2, Content::Structure(term), rank);
            Ok(())
        }

        (Content::Rigid(..), Content::Structure(..)) | (Content::Structure(..), Content::Rigid(..)) => {
            fail_mismatch(engine, hint, region, r1, r2, rank)
        }

        (Content::Alias(name1, args1, real1), Content::Alias(name2, args2, real2)) => {
            if name1 == name2 {
                debug_assert_eq!(args1.len(), args2.len(), "same alias name implies same arity");
                for ((_, a), (_, b)) in args1.iter().zip(args2.iter()) {
                    if let Err(e) = unify(engine, hint.clone(), region, *a, *b) {
                        return bail(engine, r1, r2, rank, e);
                    }
                }
                bind(engine, r1, r2, Content::Alias(name1, args1, real1), rank);
                Ok(())
            } else {
                match unify(engine, hint.clone(), region, real1, real2) {
                    Ok(()) => {
                        absorb(engine, r1, real1);
                        absorb(engine, r2, real1);
                        Ok(())
                    }
                    Err(e) => bail(engine, r1, r2, rank, e),
                }
            }
        }

        (Content::Alias(_, _, real), Content::Structure(_)) => match unify(engine, hint, region, real, r2) {
            Ok(()) => {
                absorb(engine, r1, real);
                Ok(())
            }
            Err(e) => bail(engine, r1, r2, rank, e),
        },
        (Content::Structure(_), Content::Alias(_, _, real)) => match unify(engine, hint, region, r1, real) {
            Ok(()) => {
                absorb(engine, r2, real);
                Ok(())
            }
            Err(e) => bail(engine, r1, r2, rank, e),
        },

        (Content::Structure(t1), Content::Structure(t2)) => {
            unify_structures(engine, hint, region, r1, r2, rank, t1, t2)
        }
    }
}

/// Never increases along a merge: the combined class is bound at the
/// binder depth of whichever side is tighter. A `NO_RANK` side (a
/// previously generalized scheme variable reached through a `header`
/// entry) defers entirely to the other side's rank.
fn merge_rank(a: Rank, b: Rank) -> Rank {
    if a == NO_RANK {
        b
    } else if b == NO_RANK {
        a
    } else {
        a.min(b)
    }
}

fn bind(engine: &mut Engine, r1: Variable, r2: Variable, content: Content, rank: Rank) {
    engine.table.union(r1, r2, Descriptor::new(content, rank));
}

/// After `target`'s class has already absorbed whatever `to_join` should
/// denote (via a prior recursive `unify` call), folds `to_join` into the
/// same class, reusing the descriptor `target`'s class already settled on.
fn absorb(engine: &mut Engine, to_join: Variable, target: Variable) {
    let descriptor = engine.table.descriptor(target);
    engine.table.union(to_join, target, descriptor);
}

fn check_super(
    engine: &mut Engine,
    hint: &Hint,
    region: Region,
    super_type: Option<SuperType>,
    term: &Term,
    structure_root: Variable,
) -> Result<(), TypeError> {
    let Some(super_type) = super_type else {
        return Ok(());
    };
    let satisfied = matches!(term, Term::App1(head, _) if super_type.satisfied_by_head(head));
    if satisfied {
        Ok(())
    } else {
        let actual = to_src_type(engine, structure_root);
        Err(TypeError::BadKind {
            hint: hint.clone(),
            region,
            super_type,
            actual,
        })
    }
}

/// Installs an `Error` sentinel on the combined class and re-raises `e`.
/// Used at every recursive call site so a nested failure always leaves the
/// *outer* class marked, not just the inner one that actually mismatched.
fn bail(engine: &mut Engine, r1: Variable, r2: Variable, rank: Rank, e: TypeError) -> Result<(), TypeError> {
    bind(engine, r1, r2, Content::Error("mismatch".to_string()), rank);
    Err(e)
}

fn fail_mismatch(
    engine: &mut Engine,
    hint: Hint,
    region: Region,
    r1: Variable,
    r2: Variable,
    rank: Rank,
) -> Result<(), TypeError> {
    let expected = to_src_type(engine, r1);
    let actual = to_src_type(engine, r2);
    bind(engine, r1, r2, Content::Error("mismatch".to_string()), rank);
    Err(TypeError::Mismatch {
        hint,
        region,
        expected,
        actual,
    })
}

fn unify_structures(
    engine: &mut Engine,
    hint: Hint,
    region: Region,
    r1: Variable,
    r2: Variable,
    rank: Rank,
    t1: Term,
    t2: Term,
) -> Result<(), TypeError> {
    match (t1, t2) {
        (Term::App1(c1, args1), Term::App1(c2, args2)) => {
            if c1 != c2 || args1.len() != args2.len() {
                return fail_mismatch(engine, hint, region, r1, r2, rank);
            }
            for (a, b) in args1.iter().zip(args2.iter()) {
                if let Err(e) = unify(engine, hint.clone(), region, *a, *b) {
                    return bail(engine, r1, r2, rank, e);
                }
            }
            bind(engine, r1, r2, Content::Structure(Term::App1(c1, args1)), rank);
            Ok(())
        }
        (Term::Fun1(p1, res1), Term::Fun1(p2, res2)) => {
            if let Err(e) = unify(engine, hint.clone(), region, p1, p2) {
                return bail(engine, r1, r2, rank, e);
            }
            if let Err(e) = unify(engine, hint.clone(), region, res1, res2) {
                return bail(engine, r1, r2, rank, e);
            }
            bind(engine, r1, r2, Content::Structure(Term::Fun1(p1, res1)), rank);
            Ok(())
        }
        (Term::EmptyRecord1, Term::EmptyRecord1) => {
            bind(engine, r1, r2, Content::Structure(Term::EmptyRecord1), rank);
            Ok(())
        }
        (Term::Record1(f1, e1), Term::Record1(f2, e2)) => {
            unify_records(engine, hint, region, r1, r2, rank, f1, e1, f2, e2)
        }
        _ => fail_mismatch(engine, hint, region, r1, r2, rank),
    }
}

/// Width unification for records (the `Record1` case), following the usual
/// row-unification trick: fields unique to one side get grafted onto the
/// other side's extension through a freshly shared tail variable, so both
/// records end up structurally identical.
fn unify_records(
    engine: &mut Engine,
    hint: Hint,
    region: Region,
    r1: Variable,
    r2: Variable,
    rank: Rank,
    fields1: BTreeMap<String, Variable>,
    ext1: Variable,
    fields2: BTreeMap<String, Variable>,
    ext2: Variable,
) -> Result<(), TypeError> {
    let mut only1 = BTreeMap::new();
    let mut only2 = fields2.clone();
    for (name, v1) in &fields1 {
        if let Some(v2) = only2.remove(name) {
            if let Err(e) = unify(engine, Hint::RecordField(name.clone()), region, *v1, v2) {
                return bail(engine, r1, r2, rank, e);
            }
        } else {
            only1.insert(name.clone(), *v1);
        }
    }

    if only1.is_empty() && only2.is_empty() {
        if let Err(e) = unify(engine, hint, region, ext1, ext2) {
            return bail(engine, r1, r2, rank, e);
        }
        bind(engine, r1, r2, Content::Structure(Term::Record1(fields1, ext1)), rank);
        return Ok(());
    }

    if !only2.is_empty() && crate::graph::is_closed_record(engine, ext1) {
        return fail_mismatch(engine, hint, region, r1, r2, rank);
    }
    if !only1.is_empty() && crate::graph::is_closed_record(engine, ext2) {
        return fail_mismatch(engine, hint, region, r1, r2, rank);
    }

    // Allocated at `rank`, the binder depth of the tighter of the two sides
    // being merged, rather than via `engine.fresh` (which would stamp them
    // with whichever pool is currently open) -- `extra` becomes a
    // sub-variable of both `ext1` and `ext2` once bound below, so it must
    // already belong to their rank's pool, not a deeper one that might
    // close and generalize before theirs does.
    let extra = engine.fresh_at_rank(Content::Flex(None, None), rank);

    // When one side has nothing the other lacks, its grafted extension is
    // just `extra` itself -- wrapping it in an empty-fielded `Record1` would
    // never structurally match a literal `EmptyRecord1` terminator on the
    // other end.
    let grown1 = if only2.is_empty() {
        extra
    } else {
        engine.fresh_at_rank(Content::Structure(Term::Record1(only2.clone(), extra)), rank)
    };
    if let Err(e) = unify(engine, hint.clone(), region, ext1, grown1) {
        return bail(engine, r1, r2, rank, e);
    }
    let grown2 = if only1.is_empty() {
        extra
    } else {
        engine.fresh_at_rank(Content::Structure(Term::Record1(only1.clone(), extra)), rank)
    };
    if let Err(e) = unify(engine, hint, region, ext2, grown2) {
        return bail(engine, r1, r2, rank, e);
    }

    let mut all_fields = fields1;
    for (name, v) in only2 {
        all_fields.entry(name).or_insert(v);
    }
    bind(engine, r1, r2, Content::Structure(Term::Record1(all_fields, ext1)), rank);
    Ok(())
}
