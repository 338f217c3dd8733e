//! Control flow optimization.
//!
//! Removes blocks unreachable from Start, normalizes Bad predecessors away
//! (dropping the matching Phi inputs), simplifies constant and degenerate
//! `Cond`/`Switch` nodes, removes pointless ifs, merges empty blocks into
//! their successor, and prunes keep-alive edges into dead code.
//!
//! The pass runs to a fixed point; every productive iteration removes at
//! least one block or edge or retires a forking node, and the iteration
//! count is additionally bounded by the block count, so it terminates even
//! on pathological self-loop chains.

use crate::edges::EdgeKind;
use crate::fx::FxHashMap;
use crate::ir::modes;
use crate::ir::opcode::{pn, Opcode};
use crate::ir::{Graph, Node};
use kestrel_entity::EntitySet;
use std::vec::Vec;

/// Per-iteration facts about the blocks of the graph.
struct BlockInfo {
    blocks: Vec<Node>,
    reachable: EntitySet<Node>,
    /// Phis per block.
    phis: FxHashMap<Node, Vec<Node>>,
    /// Does the block contain anything besides Jmp and Phis?
    has_content: FxHashMap<Node, bool>,
    /// The Jmp terminating the block, when that is all it does.
    jmp_of: FxHashMap<Node, Node>,
}

fn collect_info(graph: &Graph) -> BlockInfo {
    let mut info = BlockInfo {
        blocks: Vec::new(),
        reachable: EntitySet::new(),
        phis: FxHashMap::default(),
        has_content: FxHashMap::default(),
        jmp_of: FxHashMap::default(),
    };
    for n in graph.nodes() {
        match graph.opcode(n) {
            Opcode::Block => info.blocks.push(n),
            Opcode::Id => {}
            opcode => {
                let block = match graph.block(n) {
                    Some(b) => b,
                    None => continue,
                };
                match opcode {
                    Opcode::Phi => {
                        if graph.arity(n) > 0 {
                            info.phis.entry(block).or_default().push(n);
                        }
                    }
                    Opcode::Jmp => {
                        if !graph.block_users(n).is_empty() {
                            info.jmp_of.insert(block, n);
                        }
                    }
                    Opcode::Bad | Opcode::Unknown => {}
                    _ => {
                        let live = opcode.is_cfop()
                            || !graph.users(n).is_empty()
                            || !graph.block_users(n).is_empty();
                        if live {
                            info.has_content.insert(block, true);
                        }
                    }
                }
            }
        }
    }

    // Forward reachability from the start block.
    let mut succs: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
    for &b in &info.blocks {
        for i in 0..graph.arity(b) {
            let x = graph.get_in(b, i);
            if graph.is_bad(x) {
                continue;
            }
            if let Some(pred_block) = graph.block(x) {
                succs.entry(pred_block).or_default().push(b);
            }
        }
    }
    let mut stack = vec![graph.start_block()];
    while let Some(b) = stack.pop() {
        if !info.reachable.insert(b) {
            continue;
        }
        if let Some(next) = succs.get(&b) {
            for &s in next {
                stack.push(s);
            }
        }
    }
    info
}

/// Drop Bad and unreachable predecessors of `block`, rewriting its Phis
/// alongside. Returns true when something changed.
fn normalize_preds(graph: &mut Graph, info: &BlockInfo, block: Node) -> bool {
    let arity = graph.arity(block);
    let mut kept = Vec::with_capacity(arity);
    let mut kept_pos = Vec::with_capacity(arity);
    for i in 0..arity {
        let x = graph.get_in(block, i);
        let dead = graph.is_bad(x)
            || match graph.block(x) {
                Some(pb) => !info.reachable.contains(pb),
                None => true,
            };
        if !dead {
            kept.push(x);
            kept_pos.push(i);
        }
    }
    if kept.len() == arity {
        return false;
    }
    log::debug!(
        "dropping {} dead pred(s) of {}",
        arity - kept.len(),
        block
    );
    graph.set_ins(block, &kept);
    if let Some(phis) = info.phis.get(&block) {
        for &phi in phis {
            if graph.opcode(phi) != Opcode::Phi {
                continue;
            }
            let ins: Vec<Node> = kept_pos.iter().map(|&i| graph.get_in(phi, i)).collect();
            graph.set_ins(phi, &ins);
            crate::opt::local::optimize_in_place(graph, phi);
        }
    }
    true
}

/// Simplify `Cond` and `Switch` nodes whose outcome is known or that only
/// have a default successor.
fn simplify_forks(graph: &mut Graph, info: &BlockInfo) -> bool {
    let mut changed = false;
    let nodes: Vec<Node> = graph.nodes().collect();
    for n in nodes {
        let opcode = graph.opcode(n);
        if opcode != Opcode::Cond && opcode != Opcode::Switch {
            continue;
        }
        let block = match graph.block(n) {
            Some(b) => b,
            None => continue,
        };
        if !info.reachable.contains(block) {
            continue;
        }
        let projs: Vec<Node> = graph
            .users(n)
            .iter()
            .map(|e| e.src)
            .filter(|&u| graph.opcode(u) == Opcode::Proj)
            .collect();
        if projs.is_empty() {
            continue;
        }
        let selector = graph.get_in(n, 0);
        let taken = match (opcode, crate::opt::local::computed_value(graph, selector)) {
            (Opcode::Cond, Some(tv)) => Some(if tv.is_null() {
                pn::cond::FALSE
            } else {
                pn::cond::TRUE
            }),
            (Opcode::Switch, Some(tv)) => match graph.attr(n) {
                crate::ir::node::NodeAttr::Switch(table) => Some(table.lookup(tv)),
                _ => None,
            },
            _ => None,
        };
        if let Some(taken) = taken {
            log::debug!("folding constant {} {}", opcode.name(), n);
            for proj in projs {
                let num = graph.proj_num(proj);
                if num == taken {
                    let jmp = graph.new_jmp(block);
                    graph.exchange(proj, jmp);
                } else {
                    let bad = graph.new_bad(modes::X);
                    graph.exchange(proj, bad);
                }
            }
            changed = true;
            continue;
        }
        // A Switch with only the default projection is a Jmp.
        if opcode == Opcode::Switch
            && projs.len() == 1
            && graph.proj_num(projs[0]) == pn::switch::DEFAULT
        {
            log::debug!("switch {} has only a default successor", n);
            let jmp = graph.new_jmp(block);
            graph.exchange(projs[0], jmp);
            changed = true;
        }
    }
    changed
}

/// Remove pointless ifs: two predecessors of one block coming from the
/// same forking node while every Phi agrees across them.
fn remove_pointless_ifs(graph: &mut Graph, info: &BlockInfo) -> bool {
    for &block in &info.blocks {
        if !info.reachable.contains(block) || graph.arity(block) < 2 {
            continue;
        }
        let arity = graph.arity(block);
        for i in 0..arity {
            for j in i + 1..arity {
                let (xi, xj) = (graph.get_in(block, i), graph.get_in(block, j));
                if graph.opcode(xi) != Opcode::Proj || graph.opcode(xj) != Opcode::Proj {
                    continue;
                }
                let fork = graph.get_in(xi, 0);
                if fork != graph.get_in(xj, 0) || graph.opcode(fork) != Opcode::Cond {
                    continue;
                }
                let phis_agree = info.phis.get(&block).map_or(true, |phis| {
                    phis.iter().all(|&phi| {
                        graph.opcode(phi) != Opcode::Phi
                            || graph.get_in(phi, i) == graph.get_in(phi, j)
                    })
                });
                if !phis_agree {
                    continue;
                }
                log::debug!("removing pointless if {} before {}", fork, block);
                let fork_block = graph.block_of(fork);
                let jmp = graph.new_jmp(fork_block);
                graph.set_in(block, i, jmp);
                // Drop position j from the block and its Phis.
                let kept: Vec<Node> = (0..arity)
                    .filter(|&p| p != j)
                    .map(|p| graph.get_in(block, p))
                    .collect();
                graph.set_ins(block, &kept);
                if let Some(phis) = info.phis.get(&block) {
                    for &phi in phis {
                        if graph.opcode(phi) != Opcode::Phi {
                            continue;
                        }
                        let ins: Vec<Node> = (0..arity)
                            .filter(|&p| p != j)
                            .map(|p| graph.get_in(phi, p))
                            .collect();
                        graph.set_ins(phi, &ins);
                        crate::opt::local::optimize_in_place(graph, phi);
                    }
                }
                return true;
            }
        }
    }
    false
}

/// The dispensability test: may the empty block `p` be merged into its
/// successor `succ` whose `pos`-th predecessor it feeds?
fn is_dispensable(graph: &Graph, info: &BlockInfo, p: Node, succ: Node, pos: usize) -> bool {
    // Self loops stay.
    if p == succ {
        return false;
    }
    for i in 0..graph.arity(p) {
        let x = graph.get_in(p, i);
        if !graph.is_bad(x) && graph.block(x) == Some(p) {
            return false;
        }
    }
    // With Phis in the successor, fusing must not make two predecessor
    // slots indistinguishable: the other preds' blocks and p's pred blocks
    // must be disjoint.
    if info.phis.get(&succ).map_or(false, |phis| !phis.is_empty()) {
        let p_pred_blocks: Vec<Node> = (0..graph.arity(p))
            .filter_map(|i| {
                let x = graph.get_in(p, i);
                if graph.is_bad(x) {
                    None
                } else {
                    graph.block(x)
                }
            })
            .collect();
        for o in 0..graph.arity(succ) {
            if o == pos {
                continue;
            }
            let xo = graph.get_in(succ, o);
            if graph.is_bad(xo) {
                continue;
            }
            if let Some(ob) = graph.block(xo) {
                if p_pred_blocks.contains(&ob) {
                    return false;
                }
            }
        }
    }
    true
}

/// Merge empty blocks (only Jmp plus Phis) into their single successor.
fn merge_empty_blocks(graph: &mut Graph, info: &BlockInfo) -> bool {
    for &p in &info.blocks {
        if !info.reachable.contains(p)
            || p == graph.start_block()
            || p == graph.end_block()
            || graph.arity(p) == 0
        {
            continue;
        }
        if *info.has_content.get(&p).unwrap_or(&false) {
            continue;
        }
        let jmp = match info.jmp_of.get(&p) {
            Some(&j) => j,
            None => continue,
        };
        let block_users = graph.block_users(jmp);
        if block_users.len() != 1 {
            continue;
        }
        let succ = block_users[0].src;
        let pos = block_users[0].pos as usize;
        if !is_dispensable(graph, info, p, succ, pos) {
            continue;
        }
        let p_arity = graph.arity(p);
        if p_arity > 1 {
            if !graph.flags.fuse_empty_blocks {
                continue;
            }
            // Every Phi of p must dissolve into the successor's Phis; a Phi
            // with other users pins the block.
            let phis_confined = info.phis.get(&p).map_or(true, |phis| {
                phis.iter().all(|&phi| {
                    graph.opcode(phi) != Opcode::Phi
                        || graph.users(phi).iter().all(|e| {
                            graph.opcode(e.src) == Opcode::Phi
                                && graph.block(e.src) == Some(succ)
                        })
                })
            });
            if !phis_confined {
                continue;
            }
        }

        // Phis inside p either collapse (single pred) or get spliced into
        // the successor's Phis below; make the single-pred case collapse
        // now.
        if let Some(phis) = info.phis.get(&p) {
            for &phi in phis {
                crate::opt::local::optimize_in_place(graph, phi);
            }
        }

        log::debug!("merging empty block {} into {}", p, succ);
        let p_ins: Vec<Node> = (0..p_arity).map(|i| graph.get_in(p, i)).collect();
        let succ_arity = graph.arity(succ);
        let mut new_ins = Vec::with_capacity(succ_arity + p_arity - 1);
        for o in 0..succ_arity {
            if o == pos {
                new_ins.extend_from_slice(&p_ins);
            } else {
                new_ins.push(graph.get_in(succ, o));
            }
        }
        // Splice the successor's Phis first, while `pos` is still valid.
        if let Some(phis) = info.phis.get(&succ) {
            for &phi in phis {
                if graph.opcode(phi) != Opcode::Phi {
                    continue;
                }
                let mut ins = Vec::with_capacity(new_ins.len());
                for o in 0..succ_arity {
                    let v = graph.get_in(phi, o);
                    if o != pos {
                        ins.push(v);
                        continue;
                    }
                    // The value entering through p: a Phi of p expands to
                    // its per-predecessor inputs, anything else repeats.
                    if graph.opcode(v) == Opcode::Phi && graph.block(v) == Some(p) {
                        for i in 0..p_arity {
                            ins.push(graph.get_in(v, i));
                        }
                    } else {
                        for _ in 0..p_arity {
                            ins.push(v);
                        }
                    }
                }
                graph.set_ins(phi, &ins);
                crate::opt::local::optimize_in_place(graph, phi);
            }
        }
        graph.set_ins(succ, &new_ins);
        // Any Phi of p left without users dissolves into Bad; then the
        // block itself forwards to the successor, so nodes loosely placed
        // in p report the successor as their block.
        if let Some(phis) = info.phis.get(&p) {
            for &phi in phis {
                let phi = graph.skip_id(phi);
                if graph.opcode(phi) == Opcode::Phi && graph.users(phi).is_empty() {
                    let bad = graph.new_bad(graph.mode(phi));
                    graph.exchange(phi, bad);
                }
            }
        }
        graph.exchange(p, succ);
        return true;
    }
    false
}

/// Drop keep-alive edges into unreachable code.
fn prune_keep_alives(graph: &mut Graph, info: &BlockInfo) -> bool {
    let end = graph.end();
    let arity = graph.arity(end);
    let kept: Vec<Node> = (0..arity)
        .map(|i| graph.get_in(end, i))
        .filter(|&k| {
            if graph.is_bad(k) {
                return false;
            }
            match graph.block(k) {
                Some(b) => info.reachable.contains(b) || b == graph.end_block(),
                None => info.reachable.contains(k) || k == graph.end_block(),
            }
        })
        .collect();
    if kept.len() == arity {
        return false;
    }
    log::debug!("pruning {} dead keep-alive(s)", arity - kept.len());
    graph.set_ins(end, &kept);
    true
}

/// Run control flow optimization to a fixed point. Requires a matured
/// graph; activates both def–use edge kinds and leaves them active.
/// Returns true when anything changed.
pub fn optimize_cf(graph: &mut Graph) -> bool {
    if !graph.flags.optimize {
        return false;
    }
    crate::edges::activate(graph, EdgeKind::Normal);
    crate::edges::activate(graph, EdgeKind::Block);

    let mut changed_any = false;
    let n_blocks = graph
        .nodes()
        .filter(|&n| graph.opcode(n) == Opcode::Block)
        .count();
    let max_iterations = 4 + n_blocks;
    for _ in 0..max_iterations {
        let info = collect_info(graph);
        let mut changed = false;

        if graph.flags.unreachable_code {
            let blocks = info.blocks.clone();
            for b in blocks {
                if b == graph.start_block() {
                    continue;
                }
                if info.reachable.contains(b) || b == graph.end_block() {
                    changed |= normalize_preds(graph, &info, b);
                }
            }
        }
        if !changed {
            changed |= simplify_forks(graph, &info);
        }
        if !changed {
            changed |= remove_pointless_ifs(graph, &info);
        }
        if !changed {
            changed |= merge_empty_blocks(graph, &info);
        }
        if !changed {
            changed |= prune_keep_alives(graph, &info);
        }
        if !changed {
            break;
        }
        changed_any = true;
    }
    changed_any
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::tarval::{Relation, Tarval};
    use crate::ir::types::{CompoundKind, TypeStore};
    use crate::ir::node::{SwitchEntry, SwitchTable};
    use crate::settings::Flags;

    fn test_graph() -> Graph {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        Graph::new(Flags::default(), frame)
    }

    /// Close the graph with a Return in `block` and mature the end block.
    fn finish_with_return(g: &mut Graph, block: Node, results: &[Node]) {
        let mem = g.initial_mem();
        let ret = g.new_return(block, mem, results);
        let end_block = g.end_block();
        g.add_block_pred(end_block, ret);
        g.mature_block(end_block);
        g.phase = crate::ir::graph::Phase::High;
    }

    #[test]
    fn empty_block_elimination() {
        let mut g = test_graph();
        // Start -> b1 (only Jmp) -> b2 (Return).
        let b1 = g.new_block(&[g.initial_exec()]);
        let jmp = g.new_jmp(b1);
        let b2 = g.new_block(&[jmp]);
        finish_with_return(&mut g, b2, &[]);

        assert!(optimize_cf(&mut g));
        // b2's predecessor is now the initial exec directly; b1 is gone.
        assert_eq!(g.get_in(b2, 0), g.initial_exec());
        for n in g.nodes() {
            if g.opcode(n) == Opcode::Id {
                continue;
            }
            assert_ne!(g.block(n), Some(b1), "{} still sits in the dead block", n);
        }
    }

    #[test]
    fn cfopt_is_idempotent() {
        let mut g = test_graph();
        let b1 = g.new_block(&[g.initial_exec()]);
        let jmp = g.new_jmp(b1);
        let b2 = g.new_block(&[jmp]);
        finish_with_return(&mut g, b2, &[]);

        optimize_cf(&mut g);
        assert!(!optimize_cf(&mut g), "second run must be a no-op");
    }

    #[test]
    fn constant_cond_folds_to_jmp() {
        let mut g = test_graph();
        let b0 = g.new_block(&[g.initial_exec()]);
        let sel = g.new_const(Tarval::new_bool(true));
        let cond = g.new_cond(b0, sel);
        let proj_f = g.new_proj(cond, modes::X, pn::cond::FALSE);
        let proj_t = g.new_proj(cond, modes::X, pn::cond::TRUE);
        let bt = g.new_block(&[proj_t]);
        let bf = g.new_block(&[proj_f]);
        let jt = g.new_jmp(bt);
        let jf = g.new_jmp(bf);
        let join = g.new_block(&[jt, jf]);
        let c1 = g.new_const(Tarval::new_int(modes::IS32, 1));
        let c2 = g.new_const(Tarval::new_int(modes::IS32, 2));
        let phi = g.new_phi(join, &[c1, c2], modes::IS32);
        finish_with_return(&mut g, join, &[phi]);

        assert!(optimize_cf(&mut g));
        // The false path is gone; the phi collapsed to the true value.
        let end_block = g.end_block();
        let ret = g.get_in(end_block, 0);
        let res = g.get_in(ret, 1);
        assert_eq!(g.const_value(res).as_i64(), 1);
        // The Cond has no users left.
        assert!(g.users(g.skip_id(cond)).is_empty() || g.opcode(cond) == Opcode::Id);
    }

    #[test]
    fn switch_with_only_default_becomes_jmp() {
        let mut g = test_graph();
        let b0 = g.new_block(&[g.initial_exec()]);
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(b0, mem, ptr, modes::IS32);
        let sel = g.new_proj(load, modes::IS32, pn::load::RES);
        let table = SwitchTable {
            entries: vec![SwitchEntry {
                min: Tarval::new_int(modes::IS32, 1),
                max: Tarval::new_int(modes::IS32, 5),
                pn: 1,
            }],
            n_outs: 2,
        };
        let switch = g.new_switch(b0, sel, table);
        let proj_def = g.new_proj(switch, modes::X, pn::switch::DEFAULT);
        let b1 = g.new_block(&[proj_def]);
        finish_with_return(&mut g, b1, &[]);

        assert!(optimize_cf(&mut g));
        let pred = g.get_in(b1, 0);
        assert_eq!(g.opcode(pred), Opcode::Jmp);
        assert!(g.users(g.skip_id(switch)).is_empty());
    }

    #[test]
    fn pointless_if_is_removed() {
        let mut g = test_graph();
        let b0 = g.new_block(&[g.initial_exec()]);
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(b0, mem, ptr, modes::IS32);
        let x = g.new_proj(load, modes::IS32, pn::load::RES);
        let ten = g.new_const(Tarval::new_int(modes::IS32, 10));
        let sel = g.new_cmp(b0, x, ten, Relation::LESS);
        let cond = g.new_cond(b0, sel);
        let proj_f = g.new_proj(cond, modes::X, pn::cond::FALSE);
        let proj_t = g.new_proj(cond, modes::X, pn::cond::TRUE);
        // Both projections target the join directly; the Phi agrees.
        let join = g.new_block(&[proj_f, proj_t]);
        let phi = g.new_phi(join, &[x, x], modes::IS32);
        let merged = g.skip_id(phi);
        finish_with_return(&mut g, join, &[merged]);

        assert!(optimize_cf(&mut g));
        assert_eq!(g.arity(join), 1);
        assert_eq!(g.opcode(g.get_in(join, 0)), Opcode::Jmp);
    }

    #[test]
    fn unreachable_block_preds_are_dropped() {
        let mut g = test_graph();
        // An orphan block not reachable from Start jumps into b2.
        let orphan = g.new_imm_block();
        g.mature_block(orphan);
        let orphan_jmp = {
            // Give the orphan a pred so its Jmp has a block, but from
            // nothing reachable.
            g.new_jmp(orphan)
        };
        let b2 = g.new_block(&[g.initial_exec(), orphan_jmp]);
        let c1 = g.new_const(Tarval::new_int(modes::IS32, 1));
        let c2 = g.new_const(Tarval::new_int(modes::IS32, 2));
        let phi = g.new_phi(b2, &[c1, c2], modes::IS32);
        let merged = g.skip_id(phi);
        finish_with_return(&mut g, b2, &[merged]);

        assert!(optimize_cf(&mut g));
        assert_eq!(g.arity(b2), 1);
        // The phi collapsed to the reachable value.
        let end_block = g.end_block();
        let ret = g.get_in(end_block, 0);
        assert_eq!(g.const_value(g.get_in(ret, 1)).as_i64(), 1);
    }
}
