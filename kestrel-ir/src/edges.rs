//! Def–use edges: reverse references from a value to its users.
//!
//! Edges come in two kinds: `Normal` edges point from an input slot of an
//! ordinary node back to the used value, `Block` edges point from a block's
//! predecessor slot back to the control flow value, which makes them the
//! successor relation of the CFG. Each kind is activated separately per
//! graph; while a kind is active, every input mutation updates the tables,
//! so passes can iterate users without rebuilding anything.

use crate::ir::{Graph, Node, Opcode};
use kestrel_entity::SecondaryMap;
use std::vec::Vec;

/// The kind of a def–use edge.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EdgeKind {
    /// An input slot of a non-Block node.
    Normal,
    /// A predecessor slot of a Block, i.e. a CFG successor edge.
    Block,
}

/// One use of a value: input `pos` of node `src`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Edge {
    /// The using node.
    pub src: Node,
    /// The input position within `src`.
    pub pos: u32,
}

/// The per-graph edge tables.
#[derive(Clone, Debug, Default)]
pub(crate) struct EdgeTables {
    normal_active: bool,
    block_active: bool,
    normal_outs: SecondaryMap<Node, Vec<Edge>>,
    block_outs: SecondaryMap<Node, Vec<Edge>>,
}

impl EdgeTables {
    pub(crate) fn active(&self, kind: EdgeKind) -> bool {
        match kind {
            EdgeKind::Normal => self.normal_active,
            EdgeKind::Block => self.block_active,
        }
    }

    pub(crate) fn set_active(&mut self, kind: EdgeKind, active: bool) {
        match kind {
            EdgeKind::Normal => self.normal_active = active,
            EdgeKind::Block => self.block_active = active,
        }
    }

    pub(crate) fn clear(&mut self, kind: EdgeKind) {
        match kind {
            EdgeKind::Normal => self.normal_outs.clear(),
            EdgeKind::Block => self.block_outs.clear(),
        }
    }

    fn outs_mut(&mut self, kind: EdgeKind) -> &mut SecondaryMap<Node, Vec<Edge>> {
        match kind {
            EdgeKind::Normal => &mut self.normal_outs,
            EdgeKind::Block => &mut self.block_outs,
        }
    }

    pub(crate) fn outs(&self, kind: EdgeKind, tgt: Node) -> &[Edge] {
        let map = match kind {
            EdgeKind::Normal => &self.normal_outs,
            EdgeKind::Block => &self.block_outs,
        };
        match map.get(tgt) {
            Some(v) => v,
            None => &[],
        }
    }

    /// Record that input `pos` of `src` changed from `old` to `new`.
    pub(crate) fn notify(
        &mut self,
        kind: EdgeKind,
        src: Node,
        pos: u32,
        old: Option<Node>,
        new: Option<Node>,
    ) {
        if !self.active(kind) {
            return;
        }
        if let Some(old) = old {
            let list = &mut self.outs_mut(kind)[old];
            match list.iter().position(|e| e.src == src && e.pos == pos) {
                Some(i) => {
                    list.swap_remove(i);
                }
                None => panic!(
                    "edge ({}, {}) missing from out list of {}",
                    src, pos, old
                ),
            }
        }
        if let Some(new) = new {
            self.outs_mut(kind)[new].push(Edge { src, pos });
        }
    }
}

fn kind_of(graph: &Graph, src: Node) -> EdgeKind {
    if graph.opcode(src) == Opcode::Block {
        EdgeKind::Block
    } else {
        EdgeKind::Normal
    }
}

/// Build the edge tables of `kind` from scratch and activate maintenance.
///
/// Reinitializing is always safe: the tables are cleared first, so the
/// result has no invalid records regardless of the previous state.
pub fn activate(graph: &mut Graph, kind: EdgeKind) {
    graph.edges.set_active(kind, false);
    graph.edges.clear(kind);
    let mut records: Vec<(Node, Edge)> = Vec::new();
    for src in graph.nodes() {
        if kind_of(graph, src) != kind {
            continue;
        }
        for (pos, &tgt) in graph.node(src).ins().iter().enumerate() {
            records.push((
                tgt,
                Edge {
                    src,
                    pos: pos as u32,
                },
            ));
        }
    }
    graph.edges.set_active(kind, true);
    for (tgt, edge) in records {
        graph.edges.outs_mut(kind)[tgt].push(edge);
    }
}

/// Drop the edge tables of `kind` and stop maintaining them.
pub fn deactivate(graph: &mut Graph, kind: EdgeKind) {
    graph.edges.set_active(kind, false);
    graph.edges.clear(kind);
}

/// Check the edge invariant: for every input slot `(src, pos)` with target
/// `tgt`, exactly one record exists in `tgt`'s out list, and every record
/// dereferences back to its slot. Returns `true` when consistent.
pub fn verify(graph: &Graph, kind: EdgeKind) -> bool {
    if !graph.edges.active(kind) {
        return false;
    }
    // Every in-slot has exactly one record.
    for src in graph.nodes() {
        if kind_of(graph, src) != kind {
            continue;
        }
        for (pos, &tgt) in graph.node(src).ins().iter().enumerate() {
            let count = graph
                .edges
                .outs(kind, tgt)
                .iter()
                .filter(|e| e.src == src && e.pos == pos as u32)
                .count();
            if count != 1 {
                log::error!(
                    "edge ({}, {}) -> {} has {} records, expected 1",
                    src,
                    pos,
                    tgt,
                    count
                );
                return false;
            }
        }
    }
    // Every record dereferences back.
    for tgt in graph.nodes() {
        for edge in graph.edges.outs(kind, tgt) {
            let ins = graph.node(edge.src).ins();
            if ins.get(edge.pos as usize) != Some(&tgt) {
                log::error!(
                    "out record ({}, {}) of {} does not point back",
                    edge.src,
                    edge.pos,
                    tgt
                );
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{modes, Graph, Tarval};
    use crate::settings::Flags;

    fn test_graph() -> Graph {
        let mut store = crate::ir::TypeStore::new();
        let frame = store.new_compound(crate::ir::types::CompoundKind::Struct, "frame");
        Graph::new(Flags::default(), frame)
    }

    #[test]
    fn activation_builds_consistent_tables() {
        // Build with folding off so the Add survives.
        let mut store = crate::ir::TypeStore::new();
        let frame = store.new_compound(crate::ir::types::CompoundKind::Struct, "frame");
        let mut g = Graph::new(Flags::none(), frame);
        let block = g.start_block();
        let c1 = g.new_const(Tarval::new_int(modes::IS32, 1));
        let c2 = g.new_const(Tarval::new_int(modes::IS32, 2));
        let sum = g.new_add(block, c1, c2, modes::IS32);

        activate(&mut g, EdgeKind::Normal);
        assert!(verify(&g, EdgeKind::Normal));
        let users = g.users(c1);
        assert!(users.iter().any(|e| e.src == sum && e.pos == 0));
    }

    #[test]
    fn mutation_keeps_tables_consistent() {
        let mut g = test_graph();
        let block = g.start_block();
        let c1 = g.new_const(Tarval::new_int(modes::IS32, 5));
        let c2 = g.new_const(Tarval::new_int(modes::IS32, 7));
        let neg = {
            // Build with folding off so the Minus survives.
            g.flags.constant_folding = false;
            g.new_minus(block, c1, modes::IS32)
        };
        activate(&mut g, EdgeKind::Normal);
        assert!(verify(&g, EdgeKind::Normal));

        g.set_in(neg, 0, c2);
        assert!(verify(&g, EdgeKind::Normal));
        assert!(g.users(c1).iter().all(|e| e.src != neg));
        assert!(g.users(c2).iter().any(|e| e.src == neg));
    }

    #[test]
    fn deactivate_clears() {
        let mut g = test_graph();
        activate(&mut g, EdgeKind::Normal);
        assert!(g.edges_active(EdgeKind::Normal));
        deactivate(&mut g, EdgeKind::Normal);
        assert!(!g.edges_active(EdgeKind::Normal));
    }
}
