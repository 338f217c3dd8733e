//! Graph walkers.
//!
//! A walk visits every node reachable from `End` and the anchor exactly
//! once, calling a pre-order callback on first contact and a post-order
//! callback after all predecessors are done. The traversal is an explicit
//! stack, not recursion, so deep graphs cannot overflow the call stack.
//! Walkers claim the `VISITED` side channel for their lifetime.

use crate::ir::graph::Resources;
use crate::ir::{Graph, Node};
use kestrel_entity::EntitySet;
use std::vec::Vec;

enum Visit {
    Enter(Node),
    Exit(Node),
}

/// Walk all nodes reachable from `End` and the anchor.
///
/// `pre` runs when a node is first reached, `post` after all its
/// predecessors have been fully visited. Callbacks may create nodes; nodes
/// created during the walk are not visited.
pub fn walk_graph<Pre, Post>(graph: &mut Graph, pre: &mut Pre, post: &mut Post)
where
    Pre: FnMut(&mut Graph, Node),
    Post: FnMut(&mut Graph, Node),
{
    let roots = [graph.end(), graph.anchors.anchor];
    walk_from(graph, &roots, pre, post);
}

/// Walk the nodes reachable from the given roots.
pub fn walk_from<Pre, Post>(graph: &mut Graph, roots: &[Node], pre: &mut Pre, post: &mut Post)
where
    Pre: FnMut(&mut Graph, Node),
    Post: FnMut(&mut Graph, Node),
{
    graph.reserve_resources(Resources::VISITED);
    let mut visited = EntitySet::<Node>::new();
    let mut stack: Vec<Visit> = Vec::new();
    for &root in roots {
        stack.push(Visit::Enter(graph.skip_id(root)));
    }
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(n) => {
                if !visited.insert(n) {
                    continue;
                }
                pre(graph, n);
                stack.push(Visit::Exit(n));
                if let Some(block) = graph.block(n) {
                    stack.push(Visit::Enter(block));
                }
                for i in (0..graph.arity(n)).rev() {
                    stack.push(Visit::Enter(graph.get_in(n, i)));
                }
            }
            Visit::Exit(n) => post(graph, n),
        }
    }
    graph.release_resources(Resources::VISITED);
}

/// Collect every reachable node in post order.
pub fn postorder(graph: &mut Graph) -> Vec<Node> {
    let mut order = Vec::new();
    walk_graph(graph, &mut |_, _| {}, &mut |_, n| order.push(n));
    order
}

/// Walk all blocks reachable from the end block along control flow
/// predecessors. Claims the `BLOCK_VISITED` channel.
pub fn walk_blocks<F>(graph: &mut Graph, f: &mut F)
where
    F: FnMut(&mut Graph, Node),
{
    graph.reserve_resources(Resources::BLOCK_VISITED);
    let mut visited = EntitySet::<Node>::new();
    let mut stack = vec![graph.end_block()];
    while let Some(block) = stack.pop() {
        if !visited.insert(block) {
            continue;
        }
        f(graph, block);
        for i in 0..graph.arity(block) {
            let pred = graph.get_in(block, i);
            if graph.is_bad(pred) {
                continue;
            }
            if let Some(pred_block) = graph.block(pred) {
                stack.push(pred_block);
            }
        }
    }
    graph.release_resources(Resources::BLOCK_VISITED);
}
