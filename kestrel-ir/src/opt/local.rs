//! The local optimizer.
//!
//! Every node constructor funnels its fresh node through
//! [`optimize_node`]; passes rewrite existing nodes with
//! [`optimize_in_place`]. The pipeline stops at the first successful
//! rewrite and runs at most a bounded number of rounds:
//!
//! 1. `equivalent_node`: algebraic identities that return an existing node
//!    and never change the mode.
//! 2. `computed_value`: constant evaluation into a tarval.
//! 3. value numbering against the graph's identity table (CSE).
//! 4. `transform_node`: rewrites that build new nodes.

use crate::ir::modes::{self, Mode};
use crate::ir::node::NodeAttr;
use crate::ir::opcode::Opcode;
use crate::ir::tarval::{Relation, Tarval};
use crate::ir::types::Volatility;
use crate::ir::{Graph, Node};
use kestrel_entity::packed_option::PackedOption;
use smallvec::SmallVec;
use std::vec::Vec;

/// Rewrite rounds per node; transforms re-enter the pipeline at most this
/// often.
const MAX_OPT_ROUNDS: usize = 8;

/// The identity-table key of a node: everything that determines its value.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) struct NodeKey {
    opcode: Opcode,
    mode: Mode,
    block: PackedOption<Node>,
    ins: SmallVec<[Node; 4]>,
    attr: NodeAttr,
}

fn node_key(graph: &Graph, n: Node) -> NodeKey {
    let data = graph.node(n);
    let floating = data.opcode().pin_state() == crate::ir::opcode::PinState::Floats;
    let block = if graph.flags.global_cse && floating {
        PackedOption::default()
    } else {
        graph.block(n).into()
    };
    NodeKey {
        opcode: data.opcode(),
        mode: data.mode(),
        block,
        ins: data.ins().iter().map(|&i| graph.skip_id(i)).collect(),
        attr: data.attr().clone(),
    }
}

fn cse_allowed(graph: &Graph, n: Node) -> bool {
    let opcode = graph.opcode(n);
    // Control flow transfers are per-block state, not values; two Jmps in
    // one block during a graph rewrite must stay distinct nodes.
    if opcode.is_cfop() {
        return false;
    }
    match opcode {
        Opcode::Block | Opcode::Anchor | Opcode::Start | Opcode::End | Opcode::Id
        | Opcode::Alloc | Opcode::Dialect(_) => false,
        // A Phi without arguments is a placeholder under construction.
        Opcode::Phi => graph.arity(n) != 0,
        Opcode::Load => match *graph.attr(n) {
            NodeAttr::Load { volatility, .. } => volatility == Volatility::NonVolatile,
            _ => false,
        },
        Opcode::Store => match *graph.attr(n) {
            NodeAttr::Store { volatility } => volatility == Volatility::NonVolatile,
            _ => false,
        },
        _ => true,
    }
}

/// The constant value of a node, looking through `Confirm`s that pin their
/// value to a constant bound.
fn value_of(graph: &Graph, n: Node) -> Option<Tarval> {
    match graph.opcode(n) {
        Opcode::Const => Some(graph.const_value(n)),
        Opcode::Confirm => match *graph.attr(n) {
            NodeAttr::Confirm(rel) if rel == Relation::EQUAL => {
                value_of(graph, graph.get_in(n, 1))
            }
            _ => None,
        },
        _ => None,
    }
}

// ----------------------------------------------------------------------
// 1. equivalent_node

/// An existing node with the same value as `n`, if an identity applies.
/// Never changes the mode.
pub fn equivalent_node(graph: &mut Graph, n: Node) -> Option<Node> {
    let opcode = graph.opcode(n);
    let mode = graph.mode(n);
    match opcode {
        Opcode::Add => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if mode.is_int() || mode.is_reference() {
                if value_of(graph, r).map_or(false, Tarval::is_null) {
                    return Some(l);
                }
                if mode.is_int() && value_of(graph, l).map_or(false, Tarval::is_null) {
                    return Some(r);
                }
            }
            None
        }
        Opcode::Sub => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if (mode.is_int() || mode.is_reference())
                && value_of(graph, r).map_or(false, Tarval::is_null)
            {
                return Some(l);
            }
            None
        }
        Opcode::Mul => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if mode.is_num() {
                if value_of(graph, r).map_or(false, Tarval::is_one) {
                    return Some(l);
                }
                if value_of(graph, l).map_or(false, Tarval::is_one) {
                    return Some(r);
                }
            }
            None
        }
        Opcode::And => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if l == r {
                return Some(l);
            }
            let neutral = |v: Option<Tarval>| {
                v.map_or(false, |tv| {
                    if mode == modes::B {
                        tv.is_one()
                    } else {
                        tv.is_all_one()
                    }
                })
            };
            if neutral(value_of(graph, r)) {
                return Some(l);
            }
            if neutral(value_of(graph, l)) {
                return Some(r);
            }
            None
        }
        Opcode::Or => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if l == r {
                return Some(l);
            }
            if value_of(graph, r).map_or(false, Tarval::is_null) {
                return Some(l);
            }
            if value_of(graph, l).map_or(false, Tarval::is_null) {
                return Some(r);
            }
            None
        }
        Opcode::Eor => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if value_of(graph, r).map_or(false, Tarval::is_null) {
                return Some(l);
            }
            if value_of(graph, l).map_or(false, Tarval::is_null) {
                return Some(r);
            }
            None
        }
        Opcode::Shl | Opcode::Shr | Opcode::Shrs | Opcode::Rotl => {
            let r = graph.get_in(n, 1);
            if value_of(graph, r).map_or(false, Tarval::is_null) {
                return Some(graph.get_in(n, 0));
            }
            None
        }
        Opcode::Minus | Opcode::Not => {
            // Minus(Minus(x)) and Not(Not(x)).
            let op = graph.get_in(n, 0);
            if graph.opcode(op) == opcode && graph.mode(op) == mode {
                return Some(graph.get_in(op, 0));
            }
            None
        }
        Opcode::Conv => {
            let op = graph.get_in(n, 0);
            if graph.mode(op) == mode {
                return Some(op);
            }
            // Conv(Conv(x)) where x already has the final mode and the
            // intermediate mode loses no bits.
            if graph.opcode(op) == Opcode::Conv {
                let inner = graph.get_in(op, 0);
                if graph.mode(inner) == mode && graph.mode(op).bits() >= mode.bits() {
                    return Some(inner);
                }
            }
            None
        }
        Opcode::Phi => {
            if graph.arity(n) == 0 {
                return None;
            }
            // A Phi whose inputs all coincide (self loops ignored) is that
            // value; a Phi of only self loops computes nothing.
            let mut value = None;
            for i in 0..graph.arity(n) {
                let v = graph.get_in(n, i);
                if v == n || graph.is_bad(v) {
                    continue;
                }
                match value {
                    None => value = Some(v),
                    Some(seen) if seen == v => {}
                    Some(_) => return None,
                }
            }
            match value {
                Some(v) => Some(v),
                None => Some(graph.new_bad(mode)),
            }
        }
        Opcode::Sync => {
            if graph.arity(n) == 1 {
                return Some(graph.get_in(n, 0));
            }
            None
        }
        Opcode::Proj => {
            let pred = graph.get_in(n, 0);
            if graph.opcode(pred) == Opcode::Tuple {
                let num = graph.proj_num(n) as usize;
                if num < graph.arity(pred) {
                    return Some(graph.get_in(pred, num));
                }
                return Some(graph.new_bad(mode));
            }
            None
        }
        Opcode::Mux => {
            let (f, t) = (graph.get_in(n, 1), graph.get_in(n, 2));
            if f == t {
                return Some(f);
            }
            if let Some(sel) = value_of(graph, graph.get_in(n, 0)) {
                return Some(if sel.is_null() { f } else { t });
            }
            None
        }
        Opcode::Id => Some(graph.get_in(n, 0)),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// 2. computed_value

/// The tarval a side-effect-free node evaluates to, when all the operands
/// that matter are constants.
pub fn computed_value(graph: &Graph, n: Node) -> Option<Tarval> {
    let opcode = graph.opcode(n);
    let binop = |f: fn(Tarval, Tarval) -> Tarval| -> Option<Tarval> {
        let l = value_of(graph, graph.get_in(n, 0))?;
        let r = value_of(graph, graph.get_in(n, 1))?;
        let res = f(l, r);
        if res.is_bad() {
            None
        } else {
            Some(res)
        }
    };
    let unop = |f: fn(Tarval) -> Tarval| -> Option<Tarval> {
        let v = value_of(graph, graph.get_in(n, 0))?;
        let res = f(v);
        if res.is_bad() {
            None
        } else {
            Some(res)
        }
    };
    match opcode {
        Opcode::Const => Some(graph.const_value(n)),
        Opcode::Add => binop(Tarval::add),
        Opcode::Sub => binop(Tarval::sub),
        Opcode::Mul => binop(Tarval::mul),
        Opcode::Mulh => binop(Tarval::mulh),
        Opcode::And => binop(Tarval::and),
        Opcode::Or => binop(Tarval::or),
        Opcode::Eor => binop(Tarval::eor),
        Opcode::Shl => binop(Tarval::shl),
        Opcode::Shr => binop(Tarval::shr),
        Opcode::Shrs => binop(Tarval::shrs),
        Opcode::Rotl => binop(Tarval::rotl),
        Opcode::Minus => unop(Tarval::neg),
        Opcode::Abs => unop(Tarval::abs),
        Opcode::Not => unop(Tarval::not),
        Opcode::Conv => {
            let v = value_of(graph, graph.get_in(n, 0))?;
            let res = v.convert_to(graph.mode(n));
            if res.is_bad() {
                None
            } else {
                Some(res)
            }
        }
        Opcode::Cmp => {
            let relation = match *graph.attr(n) {
                NodeAttr::Cmp(rel) => rel,
                _ => return None,
            };
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            let outcome = if l == r && !graph.mode(l).is_float() {
                Relation::EQUAL
            } else {
                let lv = value_of(graph, l)?;
                let rv = value_of(graph, r)?;
                lv.compare(rv)
            };
            if outcome == Relation::FALSE {
                return None;
            }
            Some(Tarval::new_bool(relation.contains(outcome)))
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------
// 4. transform_node

/// The possible outcomes of comparing a value known to lie in `[lo, hi]`
/// against the constant `bound`, on the mode's number line.
fn interval_outcomes(lo: i128, hi: i128, bound: i128) -> Relation {
    let mut out = Relation::FALSE;
    if lo < bound {
        out |= Relation::LESS;
    }
    if lo <= bound && bound <= hi {
        out |= Relation::EQUAL;
    }
    if hi > bound {
        out |= Relation::GREATER;
    }
    out
}

fn ordered_value(tv: Tarval) -> i128 {
    if tv.mode().is_signed() {
        i128::from(tv.as_i64())
    } else {
        i128::from(tv.as_u64())
    }
}

/// The interval a `Confirm` chain pins `n` into, on the mode's number line.
fn confirmed_interval(graph: &Graph, n: Node) -> Option<(i128, i128)> {
    if graph.opcode(n) != Opcode::Confirm {
        return None;
    }
    let mode = graph.mode(n);
    if !mode.is_int() {
        return None;
    }
    let rel = match *graph.attr(n) {
        NodeAttr::Confirm(rel) => rel,
        _ => return None,
    };
    let bound = value_of(graph, graph.get_in(n, 1))?;
    let b = ordered_value(bound);
    let lo = ordered_value(mode.min());
    let hi = ordered_value(mode.max());
    match rel {
        r if r == Relation::LESS => Some((lo, b - 1)),
        r if r == Relation::LESS_EQUAL => Some((lo, b)),
        r if r == Relation::GREATER => Some((b + 1, hi)),
        r if r == Relation::GREATER_EQUAL => Some((b, hi)),
        r if r == Relation::EQUAL => Some((b, b)),
        _ => None,
    }
}

/// Opcode-specific rewrites. May create new nodes; the result re-enters the
/// pipeline, bounded by `MAX_OPT_ROUNDS`.
pub fn transform_node(graph: &mut Graph, n: Node) -> Option<Node> {
    let opcode = graph.opcode(n);
    let mode = graph.mode(n);
    match opcode {
        Opcode::Sub | Opcode::Eor => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if l == r && mode.is_int() {
                return Some(graph.new_const(mode.null()));
            }
            None
        }
        Opcode::Mul => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if mode.is_int() {
                let zero = |v: Option<Tarval>| v.map_or(false, Tarval::is_null);
                if zero(value_of(graph, l)) || zero(value_of(graph, r)) {
                    return Some(graph.new_const(mode.null()));
                }
            }
            None
        }
        Opcode::And => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if mode.is_int() {
                let zero = |v: Option<Tarval>| v.map_or(false, Tarval::is_null);
                if zero(value_of(graph, l)) || zero(value_of(graph, r)) {
                    return Some(graph.new_const(mode.null()));
                }
            }
            // Fuse And(Cmp, Cmp) over the same operands into one Cmp with
            // the intersection of the relations.
            fuse_cmp_pair(graph, n, l, r, |a, b| a & b)
        }
        Opcode::Or => {
            let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
            if mode.is_int() {
                let ones = |v: Option<Tarval>| v.map_or(false, Tarval::is_all_one);
                if ones(value_of(graph, l)) || ones(value_of(graph, r)) {
                    return Some(graph.new_const(mode.all_one()));
                }
            }
            // Fuse Or(Cmp, Cmp) over the same operands into one Cmp with
            // the union of the relations.
            fuse_cmp_pair(graph, n, l, r, |a, b| a | b)
        }
        Opcode::Cmp => transform_cmp(graph, n),
        Opcode::Sync => {
            // Flatten nested Syncs and drop duplicate memories.
            let mut flat: Vec<Node> = Vec::new();
            let mut changed = false;
            for i in 0..graph.arity(n) {
                let m = graph.get_in(n, i);
                if graph.opcode(m) == Opcode::Sync {
                    changed = true;
                    for j in 0..graph.arity(m) {
                        let inner = graph.get_in(m, j);
                        if !flat.contains(&inner) {
                            flat.push(inner);
                        }
                    }
                } else if flat.contains(&m) {
                    changed = true;
                } else {
                    flat.push(m);
                }
            }
            if !changed {
                return None;
            }
            let block = graph.block_of(n);
            Some(graph.new_sync(block, &flat))
        }
        _ => None,
    }
}

/// `And`/`Or` of two `Cmp`s of the same operand pair fuse to a single `Cmp`
/// whose relation is the intersection/union.
fn fuse_cmp_pair(
    graph: &mut Graph,
    n: Node,
    l: Node,
    r: Node,
    combine: fn(Relation, Relation) -> Relation,
) -> Option<Node> {
    if graph.opcode(l) != Opcode::Cmp || graph.opcode(r) != Opcode::Cmp {
        return None;
    }
    let (ll, lr) = (graph.get_in(l, 0), graph.get_in(l, 1));
    let (rl, rr) = (graph.get_in(r, 0), graph.get_in(r, 1));
    let lrel = match *graph.attr(l) {
        NodeAttr::Cmp(rel) => rel,
        _ => return None,
    };
    let rrel = match *graph.attr(r) {
        NodeAttr::Cmp(rel) => rel,
        _ => return None,
    };
    let rrel = if ll == rl && lr == rr {
        rrel
    } else if ll == rr && lr == rl {
        rrel.inversed()
    } else {
        return None;
    };
    let fused = combine(lrel, rrel);
    let block = graph.block_of(n);
    Some(graph.new_cmp(block, ll, lr, fused))
}

fn transform_cmp(graph: &mut Graph, n: Node) -> Option<Node> {
    let relation = match *graph.attr(n) {
        NodeAttr::Cmp(rel) => rel,
        _ => return None,
    };
    let (l, r) = (graph.get_in(n, 0), graph.get_in(n, 1));
    let op_mode = graph.mode(l);

    // Trivial relations on ordered modes.
    if op_mode.is_int() || op_mode.is_reference() {
        if relation.contains(Relation::LESS_EQUAL_GREATER) {
            return Some(graph.new_const(Tarval::new_bool(true)));
        }
        if !relation.intersects(Relation::LESS_EQUAL_GREATER) {
            return Some(graph.new_const(Tarval::new_bool(false)));
        }
    }

    // Range reasoning with a Confirm'ed left operand and constant right.
    let bound = value_of(graph, r)?;
    let (lo, hi) = confirmed_interval(graph, l)?;
    let outcomes = interval_outcomes(lo, hi, ordered_value(bound));
    if relation.contains(outcomes) {
        return Some(graph.new_const(Tarval::new_bool(true)));
    }
    if !relation.intersects(outcomes) {
        return Some(graph.new_const(Tarval::new_bool(false)));
    }
    None
}

// ----------------------------------------------------------------------
// Driver

/// Run the optimization pipeline on a node that has no users yet (fresh
/// from a constructor). Returns the node to use instead.
pub fn optimize_node(graph: &mut Graph, n: Node) -> Node {
    let mut n = graph.skip_id(n);
    if !graph.flags.optimize {
        return n;
    }
    for _ in 0..MAX_OPT_ROUNDS {
        // 1. Identities.
        if let Some(e) = equivalent_node(graph, n) {
            let e = graph.skip_id(e);
            if e != n {
                n = e;
                continue;
            }
        }
        // 2. Constant folding.
        let opcode = graph.opcode(n);
        if graph.flags.constant_folding
            && opcode != Opcode::Const
            && graph.mode(n).is_data()
        {
            if let Some(tv) = computed_value(graph, n) {
                log::trace!("fold {} {} to {}", opcode.name(), n, tv);
                return graph.new_const(tv);
            }
        }
        // 3. Value numbering.
        if graph.flags.cse && cse_allowed(graph, n) {
            let key = node_key(graph, n);
            match graph.identities.get(&key).copied() {
                Some(existing) if existing != n => {
                    // Guard against entries gone stale through rewrites.
                    if graph.opcode(existing) != Opcode::Id
                        && node_key(graph, existing) == key
                    {
                        return existing;
                    }
                    graph.identities.insert(key, n);
                }
                Some(_) => {}
                None => {
                    graph.identities.insert(key, n);
                }
            }
        }
        // 4. Transforms.
        match transform_node(graph, n) {
            Some(t) => {
                let t = graph.skip_id(t);
                if t == n {
                    break;
                }
                n = t;
            }
            None => break,
        }
    }
    n
}

/// Optimize a node that already has users: if the pipeline finds a better
/// node, the old one is exchanged for it. Returns the surviving node.
pub fn optimize_in_place(graph: &mut Graph, n: Node) -> Node {
    let n = graph.skip_id(n);
    if !graph.flags.optimize || graph.is_block(n) {
        return n;
    }
    let res = optimize_node(graph, n);
    if res != n {
        graph.exchange(n, res);
    }
    res
}

/// Run the local optimizer over every node of the graph once.
pub fn local_optimize_graph(graph: &mut Graph) {
    let nodes: Vec<Node> = graph.nodes().collect();
    for n in nodes {
        if graph.opcode(n) == Opcode::Id {
            continue;
        }
        optimize_in_place(graph, n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{CompoundKind, TypeStore};
    use crate::settings::Flags;

    fn test_graph() -> Graph {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        Graph::new(Flags::default(), frame)
    }

    #[test]
    fn const_folding_add() {
        let mut g = test_graph();
        let block = g.start_block();
        let c3 = g.new_const(Tarval::new_int(modes::IS32, 3));
        let c4 = g.new_const(Tarval::new_int(modes::IS32, 4));
        let sum = g.new_add(block, c3, c4, modes::IS32);

        // The Add constructor returns a node identical to a fresh Const 7.
        let c7 = g.new_const(Tarval::new_int(modes::IS32, 7));
        assert_eq!(sum, c7);
        assert_eq!(g.opcode(sum), Opcode::Const);
    }

    #[test]
    fn cse_identical_loads() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let l1 = g.new_load(block, mem, ptr, modes::IS32);
        let l2 = g.new_load(block, mem, ptr, modes::IS32);
        assert_eq!(l1, l2);
    }

    #[test]
    fn volatile_loads_are_not_cse() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let l1 = g.new_load_volatility(block, mem, ptr, modes::IS32, Volatility::Volatile);
        let l2 = g.new_load_volatility(block, mem, ptr, modes::IS32, Volatility::Volatile);
        assert_ne!(l1, l2);
    }

    #[test]
    fn add_zero_identity() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(block, mem, ptr, modes::IS32);
        let x = g.new_proj(load, modes::IS32, crate::ir::opcode::pn::load::RES);
        let zero = g.new_const(modes::IS32.null());
        assert_eq!(g.new_add(block, x, zero, modes::IS32), x);
        assert_eq!(g.new_add(block, zero, x, modes::IS32), x);
        assert_eq!(g.new_sub(block, x, zero, modes::IS32), x);
        let one = g.new_const(modes::IS32.one());
        assert_eq!(g.new_mul(block, x, one, modes::IS32), x);
        assert_eq!(g.new_and(block, x, x, modes::IS32), x);
    }

    #[test]
    fn sub_self_is_zero() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(block, mem, ptr, modes::IS32);
        let x = g.new_proj(load, modes::IS32, crate::ir::opcode::pn::load::RES);
        let diff = g.new_sub(block, x, x, modes::IS32);
        assert_eq!(g.opcode(diff), Opcode::Const);
        assert!(g.const_value(diff).is_null());
    }

    #[test]
    fn phi_identity_collapse() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(block, mem, ptr, modes::IS32);
        let x = g.new_proj(load, modes::IS32, crate::ir::opcode::pn::load::RES);
        // Phi with one real input and one self edge collapses.
        let phi = g.new_phi0(block, modes::IS32);
        let res = g.set_phi_arguments(phi, &[x, phi]);
        assert_eq!(res, x);
        assert_eq!(g.skip_id(phi), x);
    }

    #[test]
    fn sync_of_one_and_flattening() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        assert_eq!(g.new_sync(block, &[mem]), mem);

        let no_mem = g.no_mem();
        let s1 = g.new_sync(block, &[mem, no_mem]);
        let s2 = g.new_sync(block, &[s1, mem]);
        // Nested Sync flattens and dedups to Sync(mem, no_mem) == s1.
        assert_eq!(s2, s1);
    }

    #[test]
    fn proj_of_tuple() {
        let mut g = test_graph();
        let block = g.start_block();
        let a = g.new_const(Tarval::new_int(modes::IS32, 1));
        let b = g.new_const(Tarval::new_int(modes::IS32, 2));
        let t = g.new_tuple(block, &[a, b]);
        assert_eq!(g.new_proj(t, modes::IS32, 1), b);
    }

    #[test]
    fn cmp_same_operand() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(block, mem, ptr, modes::IS32);
        let x = g.new_proj(load, modes::IS32, crate::ir::opcode::pn::load::RES);
        let cmp = g.new_cmp(block, x, x, Relation::LESS_EQUAL);
        assert_eq!(g.opcode(cmp), Opcode::Const);
        assert!(g.const_value(cmp).is_one());
    }

    #[test]
    fn cmp_pair_fusion_or() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(block, mem, ptr, modes::IS32);
        let x = g.new_proj(load, modes::IS32, crate::ir::opcode::pn::load::RES);
        let c = g.new_const(Tarval::new_int(modes::IS32, 10));
        let lt = g.new_cmp(block, x, c, Relation::LESS);
        let eq = g.new_cmp(block, x, c, Relation::EQUAL);
        let either = g.new_or(block, lt, eq, modes::B);
        // x < 10 || x == 10 fuses into x <= 10.
        assert_eq!(g.opcode(either), Opcode::Cmp);
        match *g.attr(either) {
            NodeAttr::Cmp(rel) => assert_eq!(rel, Relation::LESS_EQUAL),
            _ => panic!("expected a Cmp"),
        }
    }

    #[test]
    fn confirm_range_decides_cmp() {
        let mut g = test_graph();
        let block = g.start_block();
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(block, mem, ptr, modes::IS32);
        let x = g.new_proj(load, modes::IS32, crate::ir::opcode::pn::load::RES);
        let ten = g.new_const(Tarval::new_int(modes::IS32, 10));
        let conf = g.new_confirm(block, x, ten, Relation::LESS);
        let twenty = g.new_const(Tarval::new_int(modes::IS32, 20));
        // x < 10 implies x < 20.
        let cmp = g.new_cmp(block, conf, twenty, Relation::LESS);
        assert_eq!(g.opcode(cmp), Opcode::Const);
        assert!(g.const_value(cmp).is_one());
        // x < 10 refutes x > 20.
        let cmp = g.new_cmp(block, conf, twenty, Relation::GREATER);
        assert_eq!(g.opcode(cmp), Opcode::Const);
        assert!(g.const_value(cmp).is_null());
    }

    #[test]
    fn cse_disabled_by_flag() {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        let mut flags = Flags::default();
        flags.cse = false;
        let mut g = Graph::new(flags, frame);
        let c1 = g.new_const(Tarval::new_int(modes::IS32, 1));
        let c2 = g.new_const(Tarval::new_int(modes::IS32, 1));
        assert_ne!(c1, c2);
    }
}
