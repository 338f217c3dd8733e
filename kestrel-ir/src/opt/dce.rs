//! Dead node elimination.
//!
//! Rewrites and folding leave dead nodes and `Id` forwarders behind in the
//! arena; they cost memory and make `n_nodes` a pessimistic size estimate.
//! This pass rebuilds the arena from the set of nodes reachable from the
//! anchor and `End`, resolving `Id` chains on the way, and remaps the
//! anchors. Node numbers are not stable across this pass.

use crate::edges::EdgeKind;
use crate::ir::node::NodeData;
use crate::ir::{Graph, Node};
use kestrel_entity::packed_option::PackedOption;
use kestrel_entity::{PrimaryMap, SecondaryMap};
use std::vec::Vec;

/// Compact the node arena of `graph`, dropping everything unreachable.
/// Returns the number of nodes removed.
pub fn dead_node_elimination(graph: &mut Graph) -> usize {
    if !graph.flags.dead_node_elim {
        return 0;
    }
    let before = graph.n_nodes();

    // Discover live nodes; Id forwarders are looked through, never kept.
    let mut map: SecondaryMap<Node, PackedOption<Node>> = SecondaryMap::new();
    let mut order: Vec<Node> = Vec::new();
    let mut next = 0u32;
    let mut stack = vec![
        graph.skip_id(graph.anchors.anchor),
        graph.end(),
    ];
    while let Some(n) = stack.pop() {
        let n = graph.skip_id(n);
        if map[n].is_some() {
            continue;
        }
        map[n] = Node::from_u32(next).unwrap().into();
        next += 1;
        order.push(n);
        for i in 0..graph.arity(n) {
            stack.push(graph.get_in(n, i));
        }
        if let Some(block) = graph.block(n) {
            stack.push(block);
        }
    }

    // Resolve the anchors while the old arena is still in place.
    let mut anchors = graph.anchors;
    anchors.anchor = map[graph.skip_id(anchors.anchor)].unwrap();
    anchors.start_block = map[graph.skip_id(anchors.start_block)].unwrap();
    anchors.start = map[graph.skip_id(anchors.start)].unwrap();
    anchors.end_block = map[graph.skip_id(anchors.end_block)].unwrap();
    anchors.end = map[graph.skip_id(anchors.end)].unwrap();
    anchors.frame = map[graph.skip_id(anchors.frame)].unwrap();
    anchors.args = map[graph.skip_id(anchors.args)].unwrap();
    anchors.initial_mem = map[graph.skip_id(anchors.initial_mem)].unwrap();
    anchors.initial_exec = map[graph.skip_id(anchors.initial_exec)].unwrap();
    anchors.no_mem = map[graph.skip_id(anchors.no_mem)].unwrap();
    anchors.bad = map[graph.skip_id(anchors.bad)].unwrap();
    anchors.unknown = map[graph.skip_id(anchors.unknown)].unwrap();

    // Rebuild the arena with remapped references.
    let mut nodes: PrimaryMap<Node, NodeData> = PrimaryMap::with_capacity(order.len());
    for &old in &order {
        let data = graph.node(old);
        let ins: Vec<Node> = data
            .ins()
            .iter()
            .map(|&i| map[graph.skip_id(i)].unwrap())
            .collect();
        let block = graph.block(old).map(|b| map[b].unwrap());
        let new = nodes.push(NodeData::new(
            data.opcode(),
            data.mode(),
            block.into(),
            &ins,
            data.attr().clone(),
        ));
        debug_assert_eq!(new, map[old].unwrap());
    }
    graph.nodes = nodes;
    graph.anchors = anchors;

    // Identity keys and edge tables refer to old numbers.
    graph.identities.clear();
    for &kind in &[EdgeKind::Normal, EdgeKind::Block] {
        if graph.edges_active(kind) {
            crate::edges::activate(graph, kind);
        }
    }

    let removed = before - graph.n_nodes();
    log::debug!("dead node elimination removed {} of {} nodes", removed, before);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcode::Opcode;
    use crate::ir::types::{CompoundKind, TypeStore};
    use crate::ir::{modes, Tarval};
    use crate::settings::Flags;

    #[test]
    fn removes_folded_leftovers() {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        let mut g = Graph::new(Flags::default(), frame);
        let block = g.start_block();
        let a = g.new_const(Tarval::new_int(modes::IS32, 3));
        let b = g.new_const(Tarval::new_int(modes::IS32, 4));
        // Folds to Const 7, leaving the raw Add dead in the arena.
        let sum = g.new_add(block, a, b, modes::IS32);
        g.keep_alive(sum);

        let before = g.n_nodes();
        let removed = dead_node_elimination(&mut g);
        assert!(removed > 0);
        assert!(g.n_nodes() < before);
        // The graph stays wired.
        assert_eq!(g.opcode(g.start()), Opcode::Start);
        assert_eq!(g.opcode(g.end()), Opcode::End);
        assert_eq!(g.block(g.start()), Some(g.start_block()));
        // The kept constant survived with its value.
        let end = g.end();
        let kept = g.get_in(end, 0);
        assert_eq!(g.const_value(kept).as_i64(), 7);
    }

    #[test]
    fn respects_flag() {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        let mut flags = Flags::default();
        flags.dead_node_elim = false;
        let mut g = Graph::new(flags, frame);
        assert_eq!(dead_node_elimination(&mut g), 0);
    }
}
