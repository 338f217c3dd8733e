//! The function inliner.
//!
//! Two entry points: [`inline_method`] splices one callee into one call
//! site, [`inline_functions`] drives a max-priority queue over every call
//! site of the program, re-checking eligibility and benefice against the
//! current graph sizes before each splice. A recursive call is unrolled one
//! level by cloning the callee first.
//!
//! Splicing works in three phases: the call's block is split so the call
//! and its operand cone sit above a fresh predecessor block, the callee
//! body is copied node by node with the anchors pre-mapped (Start becomes a
//! tuple of the actual memory/frame/argument values), and the returns are
//! stitched into per-result Phis that replace the call through a Tuple.

use crate::edges::EdgeKind;
use crate::fx::{FxHashMap, FxHashSet};
use crate::ir::entities::{Entity, GraphRef, Node, TypeRef};
use crate::ir::modes;
use crate::ir::node::{AllocKind, NodeAttr, SymConstKind};
use crate::ir::opcode::{pn, Opcode};
use crate::ir::types::TypeStore;
use crate::ir::{Graph, GraphProperties, Program};
use kestrel_entity::packed_option::PackedOption;
use kestrel_entity::{EntityRef, EntitySet, SecondaryMap};
use std::collections::BinaryHeap;
use std::vec::Vec;

/// Why a call site was not inlined.
pub type InlineRejection = &'static str;

/// Check whether `call` in `caller` may be inlined with `callee`'s body.
/// Rejection is not an error; the call simply remains.
pub fn can_inline(
    program: &Program,
    caller: GraphRef,
    call: Node,
    callee: GraphRef,
) -> Result<(), InlineRejection> {
    if caller == callee {
        return Err("self-recursive call");
    }
    let caller_graph = &program.graphs[caller];
    let callee_graph = &program.graphs[callee];
    if callee_graph.properties.contains(GraphProperties::NOINLINE) {
        return Err("callee is marked noinline");
    }
    let call = caller_graph.skip_id(call);
    if caller_graph.opcode(call) != Opcode::Call {
        return Err("not a call node");
    }
    if caller_graph.block(call) == Some(caller_graph.start_block()) {
        return Err("call sits in the start block");
    }
    let call_ty = match *caller_graph.attr(call) {
        NodeAttr::Call(ty) => ty,
        _ => return Err("call without method type"),
    };
    let n_args = caller_graph.arity(call) - 2;
    if n_args != program.types.n_params(call_ty) {
        return Err("argument count does not match the method type");
    }
    // Per-parameter mode agreement: width and arithmetic kind.
    for i in 0..n_args {
        let arg_mode = caller_graph.mode(caller_graph.get_in(call, 2 + i));
        let param_ty = program.types.param_type(call_ty, i);
        match program.types.type_mode(param_ty) {
            Some(want)
                if want.bits() == arg_mode.bits()
                    && want.arithmetic() == arg_mode.arithmetic() => {}
            Some(_) => return Err("parameter mode mismatch"),
            None => return Err("compound parameter"),
        }
    }
    // Per-result mode agreement against the callee's own signature.
    if let Some(entity) = callee_graph.entity.expand() {
        let callee_ty = program.types.entity(entity).ty;
        let (n, m) = (
            program.types.n_results(call_ty),
            program.types.n_results(callee_ty),
        );
        if n != m {
            return Err("result count mismatch");
        }
        for i in 0..n {
            let a = program.types.type_mode(program.types.result_type(call_ty, i));
            let b = program
                .types
                .type_mode(program.types.result_type(callee_ty, i));
            match (a, b) {
                (Some(a), Some(b))
                    if a.bits() == b.bits() && a.arithmetic() == b.arithmetic() => {}
                _ => return Err("result mode mismatch"),
            }
        }
    }
    // The callee frame must hold no nested methods.
    for &member in program.types.members(callee_graph.frame_type) {
        if program.types.entity(member).graph.is_some() {
            return Err("callee frame holds a method entity");
        }
    }
    // No dynamic stack allocation in the callee.
    for n in callee_graph.nodes() {
        if callee_graph.opcode(n) == Opcode::Alloc {
            if let NodeAttr::Alloc {
                kind: AllocKind::Stack,
                ..
            } = *callee_graph.attr(n)
            {
                return Err("callee allocates on the stack");
            }
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Benefice

/// Heuristic weights of the benefice computation.
mod weight {
    pub const LOOP_FACTOR: i32 = 3;
    pub const CONST_ARG: i32 = 150;
    pub const ADDRESS_ARG: i32 = 100;
    pub const PLAIN_ARG: i32 = 20;
    pub const SINGLE_BLOCK: i32 = 200;
    pub const SMALL_CALLEE: i32 = 300;
    pub const LEAF_CALLEE: i32 = 400;
    pub const SINGLE_CALLER: i32 = 200;
    pub const ALWAYS_INLINE: i32 = 100_000;
    pub const SMALL_NODES: usize = 35;
    pub const SIZE_PENALTY_DIV: usize = 2;
}

/// The blocks of `graph` that are inside a control flow cycle.
fn blocks_in_loops(graph: &Graph) -> EntitySet<Node> {
    // Successor lists of the block graph.
    let mut succs: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
    let mut blocks: Vec<Node> = Vec::new();
    for b in graph.nodes() {
        if graph.opcode(b) != Opcode::Block {
            continue;
        }
        blocks.push(b);
        for i in 0..graph.arity(b) {
            let x = graph.get_in(b, i);
            if graph.is_bad(x) {
                continue;
            }
            if let Some(pb) = graph.block(x) {
                succs.entry(pb).or_default().push(b);
            }
        }
    }

    // Iterative Tarjan; a block is in a loop when its strongly connected
    // component has more than one member or a self edge.
    const UNVISITED: u32 = u32::max_value();
    let mut index: SecondaryMap<Node, u32> = SecondaryMap::with_default(UNVISITED);
    let mut low: SecondaryMap<Node, u32> = SecondaryMap::new();
    let mut on_stack: FxHashSet<Node> = FxHashSet::default();
    let mut scc_stack: Vec<Node> = Vec::new();
    let mut in_loop = EntitySet::<Node>::new();
    let mut next_index = 0u32;
    let empty: Vec<Node> = Vec::new();

    for &root in &blocks {
        if index[root] != UNVISITED {
            continue;
        }
        // Work items are (node, next successor position).
        let mut work: Vec<(Node, usize)> = vec![(root, 0)];
        while let Some(&(n, pos)) = work.last() {
            if index[n] == UNVISITED {
                index[n] = next_index;
                low[n] = next_index;
                next_index += 1;
                scc_stack.push(n);
                on_stack.insert(n);
            }
            let ss = succs.get(&n).unwrap_or(&empty);
            if pos < ss.len() {
                let s = ss[pos];
                work.last_mut().unwrap().1 = pos + 1;
                if index[s] == UNVISITED {
                    work.push((s, 0));
                } else if on_stack.contains(&s) {
                    let bound = index[s];
                    let lowered = low[n].min(bound);
                    low[n] = lowered;
                }
            } else {
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    let child_low = low[n];
                    let lowered = low[parent].min(child_low);
                    low[parent] = lowered;
                }
                if low[n] == index[n] {
                    let mut members = Vec::new();
                    loop {
                        let m = scc_stack.pop().unwrap();
                        on_stack.remove(&m);
                        members.push(m);
                        if m == n {
                            break;
                        }
                    }
                    let non_trivial = members.len() > 1
                        || succs
                            .get(&n)
                            .map_or(false, |ss| ss.iter().any(|&s| s == n));
                    if non_trivial {
                        for m in members {
                            in_loop.insert(m);
                        }
                    }
                }
            }
        }
    }
    in_loop
}

/// Estimate how profitable inlining `callee` into `call` would be. Higher
/// is better; `i32::MIN` marks a call that must never be inlined.
pub fn calc_inline_benefice(
    program: &Program,
    caller: GraphRef,
    call: Node,
    callee: GraphRef,
) -> i32 {
    let caller_graph = &program.graphs[caller];
    let callee_graph = &program.graphs[callee];
    let props = callee_graph.properties;
    if props.contains(GraphProperties::NOINLINE) || props.contains(GraphProperties::NORETURN) {
        return i32::min_value();
    }

    let mut benefice: i32 = 0;

    // Per-argument profit.
    let call = caller_graph.skip_id(call);
    for i in 2..caller_graph.arity(call) {
        let arg = caller_graph.get_in(call, i);
        benefice += match caller_graph.opcode(arg) {
            Opcode::Const | Opcode::SymConst => weight::CONST_ARG,
            Opcode::Sel => weight::ADDRESS_ARG,
            _ => weight::PLAIN_ARG,
        };
    }

    // Callee shape bonuses.
    let callee_size = callee_graph.n_nodes();
    let n_blocks = callee_graph
        .nodes()
        .filter(|&n| callee_graph.opcode(n) == Opcode::Block)
        .count();
    // Anchored blocks are start and end; a single-block body has 3.
    if n_blocks <= 3 {
        benefice += weight::SINGLE_BLOCK;
    }
    let recursive = callee_graph.nodes().any(|n| {
        callee_graph.opcode(n) == Opcode::Call
            && program.find_callee_by_graph(callee, n) == Some(callee)
    });
    if callee_size < weight::SMALL_NODES && !recursive {
        benefice += weight::SMALL_CALLEE;
    }
    let leaf = !callee_graph
        .nodes()
        .any(|n| callee_graph.opcode(n) == Opcode::Call);
    if leaf {
        benefice += weight::LEAF_CALLEE;
    }
    if let Some(entity) = callee_graph.entity.expand() {
        use crate::ir::types::Visibility;
        if program.types.entity(entity).visibility == Visibility::Local {
            let callers = program
                .graphs
                .iter()
                .flat_map(|(r, g)| g.nodes().map(move |n| (r, n)))
                .filter(|&(r, n)| {
                    program.graphs[r].opcode(n) == Opcode::Call
                        && program.find_callee_by_graph(r, n) == Some(callee)
                })
                .count();
            if callers == 1 {
                benefice += weight::SINGLE_CALLER;
            }
        }
    }

    benefice -= (callee_size / weight::SIZE_PENALTY_DIV) as i32;

    // Call sites in loops are hotter.
    if let Some(block) = caller_graph.block(call) {
        if blocks_in_loops(caller_graph).contains(block) {
            benefice = benefice.saturating_mul(weight::LOOP_FACTOR);
        }
    }

    if props.contains(GraphProperties::ALWAYS_INLINE) {
        benefice = benefice.saturating_add(weight::ALWAYS_INLINE);
    }
    benefice
}

impl Program {
    /// `find_callee` addressed with an explicit graph reference.
    fn find_callee_by_graph(&self, graph: GraphRef, call: Node) -> Option<GraphRef> {
        self.find_callee(graph, call)
    }
}

// ----------------------------------------------------------------------
// Splicing

/// Split the block of `call`: a fresh block takes over the predecessors,
/// the Phis, and the call together with its operand cone; the old block
/// keeps everything else behind a single Jmp. Returns the fresh block.
fn part_block(caller: &mut Graph, call: Node) -> Node {
    let block = caller.block_of(call);
    let b_ins: Vec<Node> = (0..caller.arity(block))
        .map(|i| caller.get_in(block, i))
        .collect();
    let pre_block = caller.new_block(&b_ins);

    let movers: Vec<Node> = caller
        .nodes()
        .filter(|&n| {
            caller.opcode(n) == Opcode::Phi && caller.block(n) == Some(block)
        })
        .collect();
    for phi in movers {
        caller.set_block(phi, pre_block);
    }

    // The call and its data predecessors inside the old block move up.
    let mut stack = vec![call];
    let mut moved = EntitySet::<Node>::new();
    while let Some(n) = stack.pop() {
        if !moved.insert(n) {
            continue;
        }
        if caller.block(n) != Some(block) || caller.opcode(n) == Opcode::Phi {
            continue;
        }
        caller.set_block(n, pre_block);
        for i in 0..caller.arity(n) {
            stack.push(caller.get_in(n, i));
        }
    }

    let jmp = caller.new_jmp(pre_block);
    caller.set_ins(block, &[jmp]);
    pre_block
}

/// Copy the callee's frame entities into the caller's frame.
fn copy_frame_entities(
    caller_frame: TypeRef,
    callee_frame: TypeRef,
    types: &mut TypeStore,
) -> FxHashMap<Entity, Entity> {
    let mut map = FxHashMap::default();
    let members: Vec<Entity> = types.members(callee_frame).to_vec();
    for member in members {
        let name = String::from(types.ident_str(types.entity(member).name));
        let ty = types.entity(member).ty;
        let copy = types.new_entity(caller_frame, &name, ty);
        let (volatility, variability) = {
            let data = types.entity(member);
            (data.volatility, data.variability)
        };
        let copy_data = types.entity_mut(copy);
        copy_data.volatility = volatility;
        copy_data.variability = variability;
        map.insert(member, copy);
    }
    map
}

fn remap_attr(attr: &NodeAttr, entity_map: &FxHashMap<Entity, Entity>) -> NodeAttr {
    match attr {
        NodeAttr::Sel(entity) => {
            NodeAttr::Sel(*entity_map.get(entity).unwrap_or(entity))
        }
        NodeAttr::SymConst(SymConstKind::Address(entity)) => NodeAttr::SymConst(
            SymConstKind::Address(*entity_map.get(entity).unwrap_or(entity)),
        ),
        other => other.clone(),
    }
}

/// Inline `callee` into `call` inside `caller`. The borrow split between
/// the two graphs is the caller's duty; `inline_method` does it for graphs
/// registered in a program.
pub fn inline_method_raw(
    caller: &mut Graph,
    callee: &Graph,
    call: Node,
    types: &mut TypeStore,
) {
    crate::edges::activate(caller, EdgeKind::Normal);
    crate::edges::activate(caller, EdgeKind::Block);
    let call = caller.skip_id(call);
    debug_assert_eq!(caller.opcode(call), Opcode::Call);
    let post_block = caller.block_of(call);

    // Phase 1: pre-call surgery.
    let pre_block = part_block(caller, call);
    let entity_map = copy_frame_entities(caller.frame_type, callee.frame_type, types);

    let call_mem = caller.get_in(call, 0);
    let args: Vec<Node> = (2..caller.arity(call))
        .map(|i| caller.get_in(call, i))
        .collect();
    let entry_jmp = caller.new_jmp(pre_block);
    let args_tuple = caller.new_tuple(pre_block, &args);
    let frame = caller.frame();
    // Start's components in projection order: X, M, P_frame, T_args.
    let start_tuple = caller.new_tuple(pre_block, &[entry_jmp, call_mem, frame, args_tuple]);

    let mut map: SecondaryMap<Node, PackedOption<Node>> = SecondaryMap::new();
    map[callee.start()] = start_tuple.into();
    map[callee.start_block()] = pre_block.into();
    map[callee.initial_exec()] = entry_jmp.into();
    map[callee.initial_mem()] = call_mem.into();
    map[callee.frame()] = frame.into();
    map[callee.args()] = args_tuple.into();
    map[callee.no_mem()] = caller.no_mem().into();
    map[callee.anchors.bad] = caller.anchors.bad.into();
    map[callee.anchors.unknown] = caller.anchors.unknown.into();

    // Phase 2: body copy. Discover everything reachable from the callee's
    // end block preds and keep-alives, stopping at the pre-mapped anchors.
    let callee_end_block = callee.end_block();
    let callee_end = callee.end();
    let mut roots: Vec<Node> = Vec::new();
    for i in 0..callee.arity(callee_end_block) {
        roots.push(callee.get_in(callee_end_block, i));
    }
    let keepalives: Vec<Node> = (0..callee.arity(callee_end))
        .map(|i| callee.get_in(callee_end, i))
        .collect();
    roots.extend_from_slice(&keepalives);

    let mut order: Vec<Node> = Vec::new();
    let mut discovered = EntitySet::<Node>::new();
    let mut stack = roots.clone();
    while let Some(n) = stack.pop() {
        let n = callee.skip_id(n);
        if map[n].is_some() || discovered.contains(n) {
            continue;
        }
        if n == callee_end || n == callee_end_block || n == callee.anchors.anchor {
            continue;
        }
        discovered.insert(n);
        order.push(n);
        for i in 0..callee.arity(n) {
            stack.push(callee.get_in(n, i));
        }
        if let Some(block) = callee.block(n) {
            stack.push(block);
        }
    }

    // Allocate all copies first so cycles can be wired in a second pass.
    for &n in &order {
        let data = callee.node(n);
        let attr = remap_attr(data.attr(), &entity_map);
        let copy = caller.raw_node(data.opcode(), data.mode(), Default::default(), &[], attr);
        map[n] = copy.into();
    }
    for &n in &order {
        let copy = map[n].unwrap();
        let ins: Vec<Node> = (0..callee.arity(n))
            .map(|i| map[callee.get_in(n, i)].expect("callee node not mapped"))
            .collect();
        caller.set_ins(copy, &ins);
        if let Some(block) = callee.block(n) {
            caller.set_block(copy, map[block].expect("callee block not mapped"));
        }
    }

    // Phase 3: post-call stitching.
    let mut return_jmps: Vec<Node> = Vec::new();
    let mut return_mems: Vec<Node> = Vec::new();
    let mut return_results: Vec<Vec<Node>> = Vec::new();
    let mut exc_cfs: Vec<Node> = Vec::new();
    for i in 0..callee.arity(callee_end_block) {
        let pred = callee.skip_id(callee.get_in(callee_end_block, i));
        let copy = match map[pred].expand() {
            Some(c) => c,
            None => continue,
        };
        match callee.opcode(pred) {
            Opcode::Return => {
                let block = caller.block_of(copy);
                let jmp = caller.new_jmp(block);
                return_jmps.push(jmp);
                return_mems.push(caller.get_in(copy, 0));
                for (k, res) in (1..caller.arity(copy)).enumerate() {
                    if return_results.len() <= k {
                        return_results.push(Vec::new());
                    }
                    return_results[k].push(caller.get_in(copy, res));
                }
                let bad = caller.new_bad(modes::X);
                caller.exchange(copy, bad);
            }
            Opcode::Bad => {}
            _ => exc_cfs.push(copy),
        }
    }

    // Was there an exception handler at the call site?
    let handler_present = caller.users(call).iter().any(|e| {
        let u = e.src;
        caller.opcode(u) == Opcode::Proj
            && caller.proj_num(u) == pn::call::X_EXCEPT
            && !caller.block_users(u).is_empty()
    });

    caller.set_ins(post_block, &return_jmps);

    let (mem_component, result_tuple) = if return_jmps.is_empty() {
        (caller.new_bad(modes::M), caller.new_bad(modes::T))
    } else {
        let mem_phi = caller.new_phi(post_block, &return_mems, modes::M);
        let mut res_phis = Vec::new();
        for results in &return_results {
            let mode = caller.mode(results[0]);
            res_phis.push(caller.new_phi(post_block, results, mode));
        }
        let tuple = caller.new_tuple(post_block, &res_phis);
        (mem_phi, tuple)
    };
    let regular_component = if return_jmps.is_empty() {
        caller.new_bad(modes::X)
    } else {
        caller.new_jmp(post_block)
    };
    let exc_component = if exc_cfs.is_empty() {
        caller.new_bad(modes::X)
    } else if handler_present {
        if exc_cfs.len() == 1 {
            exc_cfs[0]
        } else {
            let exc_block = caller.new_block(&exc_cfs);
            caller.new_jmp(exc_block)
        }
    } else {
        // No handler: the exceptional paths end the procedure.
        let end_block = caller.end_block();
        for &cf in &exc_cfs {
            caller.add_in(end_block, cf);
        }
        caller.new_bad(modes::X)
    };

    let replacement = caller.new_tuple(
        pre_block,
        &[mem_component, regular_component, result_tuple, exc_component],
    );
    caller.exchange(call, replacement);

    // Fold the call's projections (and projections of the result tuple)
    // onto the stitched values.
    for _ in 0..3 {
        let projs: Vec<Node> = caller
            .nodes()
            .filter(|&n| caller.opcode(n) == Opcode::Proj)
            .collect();
        let mut changed = false;
        for proj in projs {
            let res = crate::opt::local::optimize_in_place(caller, proj);
            changed |= res != proj;
        }
        if !changed {
            break;
        }
    }

    // Preserve the callee's keep-alives.
    for k in keepalives {
        let k = callee.skip_id(k);
        if let Some(copy) = map[k].expand() {
            caller.keep_alive(copy);
        }
    }

    // Inlining invalidated any derived info; drop the edge tables so the
    // next pass rebuilds them.
    crate::edges::deactivate(caller, EdgeKind::Normal);
    crate::edges::deactivate(caller, EdgeKind::Block);
    caller.outs_state = crate::ir::graph::StateInfo::Inconsistent;
    caller.doms_state = crate::ir::graph::StateInfo::Inconsistent;
}

/// Inline `callee` into `call` inside `caller`, both registered in
/// `program`. Checks eligibility first; a rejection leaves everything
/// untouched.
pub fn inline_method(
    program: &mut Program,
    caller: GraphRef,
    call: Node,
    callee: GraphRef,
) -> Result<(), InlineRejection> {
    can_inline(program, caller, call, callee)?;
    let Program { graphs, types, .. } = program;
    let (caller_graph, callee_graph) = graphs
        .get_pair_mut(caller, callee)
        .expect("caller and callee must be distinct registered graphs");
    inline_method_raw(caller_graph, callee_graph, call, types);
    log::debug!("inlined {} into {} at {}", callee, caller, call);
    Ok(())
}

// ----------------------------------------------------------------------
// Global driver

#[derive(PartialEq, Eq)]
struct CallSite {
    priority: i64,
    caller: GraphRef,
    call: Node,
    callee: GraphRef,
}

impl Ord for CallSite {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.call.cmp(&other.call))
    }
}

impl PartialOrd for CallSite {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn call_sites_of(program: &Program, graph: GraphRef, from: usize) -> Vec<(Node, GraphRef)> {
    let g = &program.graphs[graph];
    g.nodes()
        .filter(|n| n.index() >= from)
        .filter(|&n| g.opcode(n) == Opcode::Call)
        .filter_map(|n| program.find_callee(graph, n).map(|callee| (n, callee)))
        .collect()
}

/// Inline calls all over the program, hottest first, while the caller stays
/// under `max_size` nodes and the benefice reaches `threshold`. Returns the
/// number of calls inlined.
pub fn inline_functions(program: &mut Program, max_size: usize, threshold: i32) -> usize {
    if !program.flags.inline {
        return 0;
    }
    let mut heap: BinaryHeap<CallSite> = BinaryHeap::new();
    let graph_refs: Vec<GraphRef> = program.graphs.keys().collect();
    for graph in graph_refs {
        for (call, callee) in call_sites_of(program, graph, 0) {
            let benefice = calc_inline_benefice(program, graph, call, callee);
            heap.push(CallSite {
                priority: i64::from(benefice),
                caller: graph,
                call,
                callee,
            });
        }
    }

    let mut inlined = 0;
    let mut unrolled: FxHashSet<(GraphRef, Node)> = FxHashSet::default();
    while let Some(site) = heap.pop() {
        // Re-validate against the current state of the graphs.
        let caller_graph = &program.graphs[site.caller];
        if caller_graph.skip_id(site.call) != site.call
            || caller_graph.opcode(site.call) != Opcode::Call
        {
            continue;
        }
        if caller_graph.n_nodes() + program.graphs[site.callee].n_nodes() > max_size {
            log::debug!("skipping {}: caller would exceed the size limit", site.call);
            continue;
        }
        let benefice = calc_inline_benefice(program, site.caller, site.call, site.callee);
        if benefice < threshold {
            continue;
        }
        let before = program.graphs[site.caller].n_nodes();
        if site.caller == site.callee {
            // One-level unroll of a recursive call: splice a clone.
            if !unrolled.insert((site.caller, site.call)) {
                continue;
            }
            let clone = program.graphs[site.callee].clone();
            if can_inline_clone(program, site.caller, site.call, &clone).is_err() {
                continue;
            }
            let Program { graphs, types, .. } = program;
            inline_method_raw(&mut graphs[site.caller], &clone, site.call, types);
        } else if inline_method(program, site.caller, site.call, site.callee).is_err() {
            continue;
        }
        inlined += 1;

        // Calls spliced in from the callee enter the queue with the
        // parent's priority scaled in, so hot nesting wins.
        for (call, callee) in call_sites_of(program, site.caller, before) {
            let child = calc_inline_benefice(program, site.caller, call, callee);
            let priority = i64::from(child).saturating_mul(site.priority.max(1));
            heap.push(CallSite {
                priority,
                caller: site.caller,
                call,
                callee,
            });
        }
    }
    log::debug!("inlined {} call site(s)", inlined);
    inlined
}

/// `can_inline` variant for a cloned callee that is not registered in the
/// program.
fn can_inline_clone(
    program: &Program,
    caller: GraphRef,
    call: Node,
    clone: &Graph,
) -> Result<(), InlineRejection> {
    if clone.properties.contains(GraphProperties::NOINLINE) {
        return Err("callee is marked noinline");
    }
    let caller_graph = &program.graphs[caller];
    if caller_graph.block(caller_graph.skip_id(call)) == Some(caller_graph.start_block()) {
        return Err("call sits in the start block");
    }
    for n in clone.nodes() {
        if clone.opcode(n) == Opcode::Alloc {
            if let NodeAttr::Alloc {
                kind: AllocKind::Stack,
                ..
            } = *clone.attr(n)
            {
                return Err("callee allocates on the stack");
            }
        }
    }
    Ok(())
}
