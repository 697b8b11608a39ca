//! Arena-based half-edge rotation system
//!
//! Directed half-edges are stored in one contiguous table and reference each
//! other by `u32` index, which removes ownership cycles from the cyclic
//! `Sym`/`Onext`/`Lnext` structure while keeping O(1) navigation.
//!
//! Half-edges are always allocated in twin pairs: `edges[i]` and
//! `edges[i ^ 1]` are the two directions of one undirected edge, so
//! `sym(e) = e ^ 1` and `sym(sym(e)) == e` holds structurally.
//!
//! Each record stores its origin point, `onext` (next half-edge sharing the
//! same origin, counter-clockwise) and `lnext` (next half-edge bounding the
//! same left face). The remaining navigation relations are derived:
//!
//! - `dst(e)  = org(sym(e))`
//! - `oprev(e) = lnext(sym(e))`
//! - `lprev(e) = sym(onext(e))`
//! - `rprev(e) = onext(sym(e))`

/// Index into the half-edge arena
pub type EdgeIdx = u32;

/// Null index sentinel
pub const INVALID: EdgeIdx = u32::MAX;

/// The opposing half-edge: same endpoints, reversed direction
#[inline(always)]
pub fn sym(e: EdgeIdx) -> EdgeIdx {
    e ^ 1
}

#[derive(Clone, Debug)]
struct HalfEdgeRec {
    /// Origin point index (into the caller's point set)
    org: u32,
    /// Next half-edge counter-clockwise around the origin
    onext: EdgeIdx,
    /// Next half-edge counter-clockwise around the left face
    lnext: EdgeIdx,
    /// Tombstone set by delete_edge; dead records are skipped by walks
    dead: bool,
}

/// A half-edge mesh over an external point set
///
/// Used as scratch topology by the divide-and-conquer triangulator. Points
/// live outside the mesh; records carry point indices only.
#[derive(Clone, Debug, Default)]
pub struct HalfEdgeMesh {
    edges: Vec<HalfEdgeRec>,
}

impl HalfEdgeMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self { edges: Vec::new() }
    }

    /// Create an empty mesh with capacity for `n` undirected edges
    pub fn with_capacity(n: usize) -> Self {
        Self {
            edges: Vec::with_capacity(n * 2),
        }
    }

    /// Total number of allocated half-edges (including dead records)
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if no half-edges were ever allocated
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns true if `e` has been deleted
    #[inline]
    pub fn is_dead(&self, e: EdgeIdx) -> bool {
        self.edges[e as usize].dead
    }

    /// Origin point index of `e`
    #[inline]
    pub fn org(&self, e: EdgeIdx) -> u32 {
        self.edges[e as usize].org
    }

    /// Destination point index of `e`
    #[inline]
    pub fn dst(&self, e: EdgeIdx) -> u32 {
        self.edges[(e ^ 1) as usize].org
    }

    /// Next half-edge counter-clockwise around the origin of `e`
    #[inline]
    pub fn onext(&self, e: EdgeIdx) -> EdgeIdx {
        self.edges[e as usize].onext
    }

    /// Previous half-edge around the origin of `e` (clockwise neighbor)
    #[inline]
    pub fn oprev(&self, e: EdgeIdx) -> EdgeIdx {
        self.edges[(e ^ 1) as usize].lnext
    }

    /// Next half-edge counter-clockwise around the left face of `e`
    #[inline]
    pub fn lnext(&self, e: EdgeIdx) -> EdgeIdx {
        self.edges[e as usize].lnext
    }

    /// Previous half-edge around the left face of `e`
    #[inline]
    pub fn lprev(&self, e: EdgeIdx) -> EdgeIdx {
        self.edges[e as usize].onext ^ 1
    }

    /// Next half-edge counter-clockwise around the right face of `e`
    #[inline]
    pub fn rprev(&self, e: EdgeIdx) -> EdgeIdx {
        self.edges[(e ^ 1) as usize].onext
    }

    /// Allocate a standalone edge pair from `org` to `dst`
    ///
    /// The new edge forms its own origin rings (`onext(e) == e`) and a
    /// two-edge face loop with its twin (`lnext(e) == sym(e)`).
    pub fn make_edge(&mut self, org: u32, dst: u32) -> EdgeIdx {
        let e = self.edges.len() as EdgeIdx;
        let s = e ^ 1;
        self.edges.push(HalfEdgeRec {
            org,
            onext: e,
            lnext: s,
            dead: false,
        });
        self.edges.push(HalfEdgeRec {
            org: dst,
            onext: s,
            lnext: e,
            dead: false,
        });
        e
    }

    /// Splice the origin rings of `a` and `b`
    ///
    /// The fundamental topology operator: if `a` and `b` are in distinct
    /// origin rings they are merged; if they are in the same ring it is
    /// split in two. `lnext` links across the affected faces are updated to
    /// stay consistent with the new rotation.
    pub fn splice(&mut self, a: EdgeIdx, b: EdgeIdx) {
        let a_onext = self.edges[a as usize].onext;
        let b_onext = self.edges[b as usize].onext;

        self.edges[(a_onext ^ 1) as usize].lnext = b;
        self.edges[(b_onext ^ 1) as usize].lnext = a;
        self.edges[a as usize].onext = b_onext;
        self.edges[b as usize].onext = a_onext;
    }

    /// Connect the destination of `a` to the origin of `b`
    ///
    /// Adds a new edge from `dst(a)` to `org(b)` such that all three edges
    /// share the same left face after the connection. Returns the new edge.
    pub fn connect(&mut self, a: EdgeIdx, b: EdgeIdx) -> EdgeIdx {
        let e = self.make_edge(self.dst(a), self.org(b));
        let a_lnext = self.lnext(a);
        self.splice(e, a_lnext);
        self.splice(e ^ 1, b);
        e
    }

    /// Remove `e` and its twin from the mesh
    ///
    /// Splices both half-edges out of their endpoint rings and tombstones
    /// the pair. Navigation through the dead pair is undefined afterwards.
    pub fn delete_edge(&mut self, e: EdgeIdx) {
        let op = self.oprev(e);
        self.splice(e, op);
        let sop = self.oprev(e ^ 1);
        self.splice(e ^ 1, sop);
        self.edges[e as usize].dead = true;
        self.edges[(e ^ 1) as usize].dead = true;
    }

    /// Iterate over every live half-edge index
    pub fn live_edges(&self) -> impl Iterator<Item = EdgeIdx> + '_ {
        (0..self.edges.len() as EdgeIdx).filter(move |&e| !self.edges[e as usize].dead)
    }

    /// Structural diagnostic for tests and validation
    ///
    /// Checks, for every live half-edge: its twin is live, the origin rings
    /// agree on their shared origin, and `onext`/`oprev` and
    /// `lnext`/`lprev` are mutual inverses. Returns human-readable
    /// descriptions of every violation found.
    pub fn check(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for e in self.live_edges() {
            if self.is_dead(e ^ 1) {
                issues.push(format!("edge {}: twin {} is dead", e, e ^ 1));
                continue;
            }
            let on = self.onext(e);
            if self.is_dead(on) {
                issues.push(format!("edge {}: onext {} is dead", e, on));
                continue;
            }
            if self.org(on) != self.org(e) {
                issues.push(format!(
                    "edge {}: onext {} has origin {} != {}",
                    e,
                    on,
                    self.org(on),
                    self.org(e)
                ));
            }
            if self.oprev(on) != e {
                issues.push(format!("edge {}: oprev(onext) = {} != self", e, self.oprev(on)));
            }
            let ln = self.lnext(e);
            if self.is_dead(ln) {
                issues.push(format!("edge {}: lnext {} is dead", e, ln));
                continue;
            }
            if self.org(ln) != self.dst(e) {
                issues.push(format!(
                    "edge {}: lnext {} starts at {} != dst {}",
                    e,
                    ln,
                    self.org(ln),
                    self.dst(e)
                ));
            }
            if self.lprev(ln) != e {
                issues.push(format!("edge {}: lprev(lnext) = {} != self", e, self.lprev(ln)));
            }
        }
        issues
    }
}
