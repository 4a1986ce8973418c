//! Shared mutable context threaded through C2/C3/C4: the union-find store,
//! the pool stack, and the mark counter. Spec §5 calls these out as the
//! solver's one block of "entangled mutable state" -- `Engine` is that
//! state, with `Solver` (C5, in `solve.rs`) as its only orchestrator.

use crate::descriptor::{Content, Descriptor};
use crate::pool::Pool;
use crate::table::UnionFind;
use crate::var::{Mark, MarkGenerator, Rank, Variable, OUTERMOST_RANK};

pub struct Engine {
    pub table: UnionFind,
    /// Pool stack; the last entry is the current pool. Always non-empty.
    pools: Vec<Pool>,
    marks: MarkGenerator,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            table: UnionFind::new(),
            pools: vec![Pool::new(OUTERMOST_RANK)],
            marks: MarkGenerator::new(),
        }
    }

    pub fn current_rank(&self) -> Rank {
        self.pools.last().expect("pool stack is never empty").rank
    }

    pub fn fresh_mark(&mut self) -> Mark {
        self.marks.fresh()
    }

    /// Registers `v` as an inhabitant of the current pool.
    pub fn register(&mut self, v: Variable) {
        self.pools
            .last_mut()
            .expect("pool stack is never empty")
            .inhabitants
            .push(v);
    }

    /// Allocates a fresh variable with the given content at the current
    /// pool's rank, and registers it in that pool.
    pub fn fresh(&mut self, content: Content) -> Variable {
        let rank = self.current_rank();
        self.fresh_at_rank(content, rank)
    }

    /// Allocates a fresh variable with the given content at `rank`, which
    /// need not be the current pool's rank, and registers it in the pool
    /// that owns that rank rather than whichever pool is presently open.
    ///
    /// Needed whenever unification synthesizes a variable that is about to
    /// be bound into classes reachable from an outer, still-open pool (e.g.
    /// a record's shared extension row): registering it in the innermost
    /// pool instead would let that pool's own `generalize` find and
    /// rigidify it out from under the outer scope it actually belongs to.
    pub fn fresh_at_rank(&mut self, content: Content, rank: Rank) -> Variable {
        let v = self.table.fresh(Descriptor::new(content, rank));
        match self.pools.iter_mut().rev().find(|p| p.rank == rank) {
            Some(pool) => pool.inhabitants.push(v),
            None => self.register(v),
        }
        v
    }

    /// Opens a new pool one rank deeper than the current one (`let` entry).
    pub fn enter_next_rank_pool(&mut self) {
        let rank = self.current_rank() + 1;
        self.pools.push(Pool::new(rank));
    }

    /// Closes the current pool and returns it (the "young pool" of a just
    /// solved `let` scheme), switching back to the enclosing pool.
    ///
    /// # Panics
    /// Panics if called on the outermost pool -- a solver-internal
    /// invariant violation, not a condition callers can trigger.
    pub fn leave_pool(&mut self) -> Pool {
        assert!(self.pools.len() > 1, "cannot leave the outermost pool");
        self.pools.pop().expect("checked above")
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
