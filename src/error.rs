//! Error taxonomy (§7) with provenance tracking, mirroring the teacher's
//! `ConstraintOrigin`/`TypeError` split: every error carries a `Hint`
//! describing which constraint produced it and a `Region` pinpointing where.

use crate::descriptor::SuperType;
use crate::graph::SourceType;

/// A byte-range location in the original source, supplied by the
/// elaborator. Reusing `rowan::TextRange` keeps this crate's span
/// representation identical to the one the rest of the compiler already
/// uses for concrete syntax trees.
pub type Region = rowan::TextRange;

/// Why a constraint was generated -- attached to every `Equal`/`Instance`
/// constraint so failures can explain themselves instead of just saying
/// "mismatch".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hint {
    /// A plain equality constraint with no further context.
    Equality,
    /// Instantiating the named identifier's scheme.
    Instance(String),
    /// Unifying one field of a record literal or pattern.
    RecordField(String),
    /// Unifying the n-th argument of a function application.
    FunctionArg(usize),
    /// Unifying a function's declared and inferred result type.
    FunctionResult,
    /// A caller-supplied tag for hints not covered above.
    Custom(&'static str),
}

/// A type error encountered while solving. Unification failures accumulate
/// in `Solver::errors` rather than aborting the walk (§7); `InternalInvariant`
/// is the one kind that aborts `solve` immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    /// Two classes could not be unified.
    Mismatch {
        hint: Hint,
        region: Region,
        expected: SourceType,
        actual: SourceType,
    },
    /// A `Let` binding's body contains itself structurally.
    InfiniteType {
        name: String,
        region: Region,
        rendering: SourceType,
    },
    /// A `Flex`/`Rigid` super-constraint was violated.
    BadKind {
        hint: Hint,
        region: Region,
        super_type: SuperType,
        actual: SourceType,
    },
    /// Generalization found a rigid quantifier that never reached `NO_RANK`.
    /// Always fatal -- see `Solver::solve`.
    InternalInvariant { message: String },
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeError::Mismatch { expected, actual, .. } => {
                write!(f, "type mismatch: expected `{expected}`, found `{actual}`")
            }
            TypeError::InfiniteType { name, rendering, .. } => {
                write!(f, "infinite type: `{name}` occurs in `{rendering}`")
            }
            TypeError::BadKind { super_type, actual, .. } => {
                write!(f, "`{actual}` does not satisfy the {super_type:?} constraint")
            }
            TypeError::InternalInvariant { message } => {
                write!(f, "internal invariant violated: {message}")
            }
        }
    }
}

impl std::error::Error for TypeError {}
