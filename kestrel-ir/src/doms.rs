//! Dominator information for the block graph.
//!
//! Computed with the classic iterative algorithm over a reverse postorder
//! of the CFG. Consumers check `dominates` pairs; the SSA verifier uses it
//! to validate the dominance invariant of all value uses.

use crate::fx::FxHashMap;
use crate::ir::opcode::Opcode;
use crate::ir::{Graph, Node};
use kestrel_entity::packed_option::PackedOption;
use kestrel_entity::SecondaryMap;
use std::vec::Vec;

/// The immediate-dominator tree of the blocks reachable from Start.
pub struct DominatorTree {
    idom: SecondaryMap<Node, PackedOption<Node>>,
    rpo_num: SecondaryMap<Node, u32>,
}

impl DominatorTree {
    /// Compute the tree for `graph`. Blocks not reachable from the start
    /// block have no dominator and report `is_reachable == false`.
    pub fn compute(graph: &Graph) -> Self {
        let start = graph.start_block();

        // Successors and predecessors of the block graph.
        let mut succs: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
        let mut preds: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
        for b in graph.nodes() {
            if graph.opcode(b) != Opcode::Block {
                continue;
            }
            for i in 0..graph.arity(b) {
                let x = graph.get_in(b, i);
                if graph.is_bad(x) {
                    continue;
                }
                if let Some(pb) = graph.block(x) {
                    succs.entry(pb).or_default().push(b);
                    preds.entry(b).or_default().push(pb);
                }
            }
        }

        // Depth-first postorder from the start block, reversed.
        let mut postorder: Vec<Node> = Vec::new();
        let mut state: SecondaryMap<Node, u8> = SecondaryMap::new();
        let mut stack: Vec<(Node, usize)> = vec![(start, 0)];
        state[start] = 1;
        let empty: Vec<Node> = Vec::new();
        while let Some(&(b, pos)) = stack.last() {
            let ss = succs.get(&b).unwrap_or(&empty);
            if pos < ss.len() {
                stack.last_mut().unwrap().1 = pos + 1;
                let s = ss[pos];
                if state[s] == 0 {
                    state[s] = 1;
                    stack.push((s, 0));
                }
            } else {
                stack.pop();
                postorder.push(b);
            }
        }
        let mut rpo: Vec<Node> = postorder;
        rpo.reverse();

        let mut rpo_num: SecondaryMap<Node, u32> = SecondaryMap::with_default(u32::max_value());
        for (i, &b) in rpo.iter().enumerate() {
            rpo_num[b] = i as u32;
        }

        let mut idom: SecondaryMap<Node, PackedOption<Node>> = SecondaryMap::new();
        idom[start] = start.into();
        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom: Option<Node> = None;
                for &p in preds.get(&b).unwrap_or(&empty) {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(other) => intersect(&idom, &rpo_num, p, other),
                    });
                }
                if let Some(ni) = new_idom {
                    if idom[b].expand() != Some(ni) {
                        idom[b] = ni.into();
                        changed = true;
                    }
                }
            }
        }

        Self { idom, rpo_num }
    }

    /// Is `b` reachable from the start block?
    pub fn is_reachable(&self, b: Node) -> bool {
        self.idom[b].is_some()
    }

    /// The immediate dominator of `b`; the start block dominates itself.
    pub fn idom(&self, b: Node) -> Option<Node> {
        self.idom[b].expand()
    }

    /// Does block `a` dominate block `b`? Unreachable blocks dominate
    /// nothing and are dominated by nothing.
    pub fn dominates(&self, a: Node, b: Node) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut cursor = b;
        loop {
            if cursor == a {
                return true;
            }
            let up = self.idom[cursor].unwrap();
            if up == cursor {
                // Reached the start block.
                return cursor == a;
            }
            cursor = up;
        }
    }
}

fn intersect(
    idom: &SecondaryMap<Node, PackedOption<Node>>,
    rpo_num: &SecondaryMap<Node, u32>,
    a: Node,
    b: Node,
) -> Node {
    let (mut a, mut b) = (a, b);
    while a != b {
        while rpo_num[a] > rpo_num[b] {
            a = idom[a].unwrap();
        }
        while rpo_num[b] > rpo_num[a] {
            b = idom[b].unwrap();
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcode::pn;
    use crate::ir::types::{CompoundKind, TypeStore};
    use crate::ir::modes;
    use crate::settings::Flags;

    #[test]
    fn diamond_dominance() {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        let mut g = Graph::new(Flags::default(), frame);
        let b0 = g.new_block(&[g.initial_exec()]);
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(b0, mem, ptr, modes::B);
        let sel = g.new_proj(load, modes::B, pn::load::RES);
        let cond = g.new_cond(b0, sel);
        let proj_t = g.new_proj(cond, modes::X, pn::cond::TRUE);
        let proj_f = g.new_proj(cond, modes::X, pn::cond::FALSE);
        let bt = g.new_block(&[proj_t]);
        let bf = g.new_block(&[proj_f]);
        let jt = g.new_jmp(bt);
        let jf = g.new_jmp(bf);
        let join = g.new_block(&[jt, jf]);

        let doms = DominatorTree::compute(&g);
        let start = g.start_block();
        assert!(doms.dominates(start, join));
        assert!(doms.dominates(b0, bt));
        assert!(doms.dominates(b0, bf));
        assert!(doms.dominates(b0, join));
        assert!(!doms.dominates(bt, join));
        assert!(!doms.dominates(bf, bt));
        assert!(doms.dominates(join, join));
        assert_eq!(doms.idom(join), Some(b0));

        let orphan = g.new_imm_block();
        g.mature_block(orphan);
        let doms = DominatorTree::compute(&g);
        assert!(!doms.is_reachable(orphan));
        assert!(!doms.dominates(start, orphan));
    }
}
