//! A Hindley-Milner constraint solver with let-polymorphism via rank-based
//! generalization, built around a union-find graph of types (`ena`) rather
//! than a substitution-based algorithm.
//!
//! The entry point is [`Solver`]: an elaborator allocates graph variables
//! through [`Solver::engine_mut`], builds a [`Constraint`] tree over them
//! (typically via [`graph::flatten`]ing [`graph::SourceTerm`]s), and calls
//! [`Solver::solve`]. The result is either a [`State`] mapping every
//! `let`-bound name to its principal type, or the list of [`error::TypeError`]s
//! that kept it from typechecking.
//!
//! This crate never prints or logs: every observable outcome, success or
//! failure, is returned as a value.

pub mod constraint;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod graph;
pub mod pool;
pub mod solve;
pub mod table;
pub mod unify;
pub mod var;

pub use constraint::{Constraint, LocatedVariable, Scheme};
pub use engine::Engine;
pub use error::{Hint, Region, TypeError};
pub use graph::{flatten, to_src_type, SourceTerm, SourceType};
pub use solve::{Solver, State};
pub use var::Variable;
