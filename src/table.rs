//! C1: Union-Find. Classic union-by-rank with path compression over `ena`'s
//! `InPlaceUnificationTable`, carrying a [`Descriptor`] per equivalence class.
//!
//! The "rank" `ena` uses internally to balance the disjoint-set forest is
//! entirely separate from [`Descriptor::rank`] (the polymorphism rank,
//! which is ordinary user data from `ena`'s point of view). `unify`'s own
//! `union_value` lets us overwrite the descriptor at the combined root after
//! `ena` has picked which side becomes the root, so the two notions of
//! "rank" never interact.

use ena::unify::InPlaceUnificationTable;

use crate::descriptor::{Content, Descriptor};
use crate::var::{Rank, Variable};

pub struct UnionFind {
    table: InPlaceUnificationTable<Variable>,
}

impl UnionFind {
    pub fn new() -> Self {
        UnionFind {
            table: InPlaceUnificationTable::new(),
        }
    }

    /// Allocates a new singleton class with the given descriptor.
    pub fn fresh(&mut self, descriptor: Descriptor) -> Variable {
        self.table.new_key(descriptor)
    }

    /// Returns the representative of `v`'s class, compressing paths.
    pub fn find(&mut self, v: Variable) -> Variable {
        self.table.find(v)
    }

    /// Returns the root's descriptor. Shared and observable by every member
    /// of the class.
    pub fn descriptor(&mut self, v: Variable) -> Descriptor {
        self.table.probe_value(v)
    }

    /// Overwrites the root's descriptor. Every member of the class observes
    /// the change through `descriptor`.
    pub fn set_descriptor(&mut self, v: Variable, descriptor: Descriptor) {
        let root = self.table.find(v);
        self.table.union_value(root, descriptor);
    }

    /// Reads, transforms, and writes back the root's descriptor.
    pub fn modify_descriptor(&mut self, v: Variable, f: impl FnOnce(Descriptor) -> Descriptor) {
        let current = self.descriptor(v);
        self.set_descriptor(v, f(current));
    }

    /// Convenience: overwrite just the `rank` field of the root's descriptor.
    pub fn set_rank(&mut self, v: Variable, rank: Rank) {
        self.modify_descriptor(v, |mut d| {
            d.rank = rank;
            d
        });
    }

    /// Convenience: overwrite just the content of the root's descriptor,
    /// leaving rank/mark/copy untouched.
    pub fn set_content(&mut self, v: Variable, content: Content) {
        self.modify_descriptor(v, |mut d| {
            d.content = content;
            d
        });
    }

    /// Merges `a` and `b`'s classes and installs `descriptor` on the
    /// combined root. Idempotent when `find(a) == find(b)`: `ena`'s `union`
    /// is a no-op in that case, and we still (re)install the given
    /// descriptor on the (unchanged) root.
    ///
    /// This is the only operation that may call `ena`'s `union`; C3 (the
    /// unifier) is the only caller above this layer allowed to invoke it.
    pub fn union(&mut self, a: Variable, b: Variable, descriptor: Descriptor) {
        self.table.union(a, b);
        let root = self.table.find(a);
        self.table.union_value(root, descriptor);
    }

    /// Whether `a` and `b` currently denote the same equivalence class.
    pub fn equivalent(&mut self, a: Variable, b: Variable) -> bool {
        self.table.unioned(a, b)
    }

    /// Whether `v` is not a root -- i.e. has been unioned into another
    /// class and no longer carries a live descriptor of its own.
    pub fn redundant(&mut self, v: Variable) -> bool {
        self.table.find(v) != v
    }
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}
