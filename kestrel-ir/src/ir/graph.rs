//! The procedure graph.
//!
//! A `Graph` owns the node arena of one procedure. Nodes are created
//! through the `new_*` constructors, which feed every fresh node through the
//! local optimizer; the node that comes back may therefore be an older,
//! equivalent node. The graph also owns the def–use edge tables, the
//! identity table used for value numbering, and the anchor nodes every
//! procedure has (Start, End, the frame pointer, the argument tuple, ...).
//!
//! Rewrites go through [`Graph::exchange`]: with active def–use edges the
//! users are re-pointed on the spot, otherwise the old node becomes an `Id`
//! forwarder which all accessors skip and dead node elimination removes.

use crate::edges::{Edge, EdgeKind, EdgeTables};
use crate::ir::entities::{Entity, Node, TypeRef};
use crate::ir::modes::{self, Mode};
use crate::ir::node::{
    AllocKind, BlockAttr, NodeAttr, NodeData, SwitchTable, SymConstKind,
};
use crate::ir::opcode::{pn, Opcode};
use crate::ir::tarval::{Relation, Tarval};
use crate::ir::types::Volatility;
use crate::settings::Flags;
use kestrel_entity::packed_option::PackedOption;
use kestrel_entity::{Keys, PrimaryMap};
use std::vec::Vec;

bitflags! {
    /// The per-node side channels a pass can claim.
    ///
    /// At most one pass may use a given channel at a time. Reserve before
    /// use, release after; double reservation is a programmer error and
    /// panics.
    pub struct Resources: u8 {
        /// The node visited marks used by graph walkers.
        const VISITED = 0x1;
        /// The block visited marks used by block walkers.
        const BLOCK_VISITED = 0x2;
        /// The per-node scratch link.
        const LINK = 0x4;
        /// The per-block Phi lists maintained during construction.
        const PHI_LIST = 0x8;
    }
}

bitflags! {
    /// Properties of a procedure, consulted by interprocedural passes.
    pub struct GraphProperties: u8 {
        /// The procedure must not be inlined.
        const NOINLINE = 0x1;
        /// The procedure should be inlined wherever possible.
        const ALWAYS_INLINE = 0x2;
        /// The procedure never returns.
        const NORETURN = 0x4;
    }
}

/// Life phase of a graph.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Under construction; blocks may still be immature.
    Building,
    /// Construction finished, high-level representation.
    High,
    /// Handed to a back end.
    Backend,
}

/// Consistency of derived information (out edges, dominance, ...).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StateInfo {
    /// Never computed.
    None,
    /// Computed and up to date.
    Consistent,
    /// Computed, then invalidated by a change.
    Inconsistent,
}

/// The anchor nodes of a graph.
#[derive(Copy, Clone, Debug)]
pub struct Anchors {
    /// The node whose inputs pin all anchors below.
    pub anchor: Node,
    /// The block holding `Start` and all constants.
    pub start_block: Node,
    /// The `Start` node.
    pub start: Node,
    /// The block whose predecessors are the `Return`s and `Raise`s.
    pub end_block: Node,
    /// The `End` node; its inputs are the keep-alive list.
    pub end: Node,
    /// The frame base pointer, `Proj(Start, P_frame_base)`.
    pub frame: Node,
    /// The argument tuple, `Proj(Start, T_args)`.
    pub args: Node,
    /// The initial memory, `Proj(Start, M)`.
    pub initial_mem: Node,
    /// The initial control flow token, `Proj(Start, X_initial_exec)`.
    pub initial_exec: Node,
    /// The `NoMem` sentinel.
    pub no_mem: Node,
    /// The generic `Bad` sentinel.
    pub bad: Node,
    /// The generic `Unknown` sentinel.
    pub unknown: Node,
}

/// A procedure graph.
#[derive(Clone, Debug)]
pub struct Graph {
    pub(crate) nodes: PrimaryMap<Node, NodeData>,
    /// The anchor nodes.
    pub anchors: Anchors,
    /// The method entity this graph implements, if registered.
    pub entity: PackedOption<Entity>,
    /// The compound type of the stack frame.
    pub frame_type: TypeRef,
    /// The optimizer settings this graph was created with.
    pub flags: Flags,
    /// Procedure properties.
    pub properties: GraphProperties,
    /// Life phase.
    pub phase: Phase,
    /// Consistency of the def–use information.
    pub outs_state: StateInfo,
    /// Consistency of dominance information.
    pub doms_state: StateInfo,
    /// Consistency of callee information at Call nodes.
    pub callee_info_state: StateInfo,
    /// Consistency of type information attached to nodes.
    pub typeinfo_state: StateInfo,
    pub(crate) edges: EdgeTables,
    pub(crate) identities: crate::fx::FxHashMap<crate::opt::local::NodeKey, Node>,
    reserved: Resources,
}

impl Graph {
    /// Create a graph with freshly built anchors.
    pub fn new(flags: Flags, frame_type: TypeRef) -> Self {
        let mut graph = Self {
            nodes: PrimaryMap::new(),
            anchors: Anchors {
                // Placeholder values, fixed up below.
                anchor: Node::from_u32(0).unwrap(),
                start_block: Node::from_u32(0).unwrap(),
                start: Node::from_u32(0).unwrap(),
                end_block: Node::from_u32(0).unwrap(),
                end: Node::from_u32(0).unwrap(),
                frame: Node::from_u32(0).unwrap(),
                args: Node::from_u32(0).unwrap(),
                initial_mem: Node::from_u32(0).unwrap(),
                initial_exec: Node::from_u32(0).unwrap(),
                no_mem: Node::from_u32(0).unwrap(),
                bad: Node::from_u32(0).unwrap(),
                unknown: Node::from_u32(0).unwrap(),
            },
            entity: PackedOption::default(),
            frame_type,
            flags,
            properties: GraphProperties::empty(),
            phase: Phase::Building,
            outs_state: StateInfo::None,
            doms_state: StateInfo::None,
            callee_info_state: StateInfo::None,
            typeinfo_state: StateInfo::None,
            edges: EdgeTables::default(),
            identities: crate::fx::FxHashMap::default(),
            reserved: Resources::empty(),
        };

        let start_block = graph.raw_node(
            Opcode::Block,
            modes::BB,
            Default::default(),
            &[],
            NodeAttr::Block(BlockAttr { matured: true }),
        );
        let start = graph.raw_node(Opcode::Start, modes::T, start_block.into(), &[], NodeAttr::None);
        let initial_exec = graph.raw_node(
            Opcode::Proj,
            modes::X,
            start_block.into(),
            &[start],
            NodeAttr::Proj(pn::start::X_INITIAL_EXEC),
        );
        let initial_mem = graph.raw_node(
            Opcode::Proj,
            modes::M,
            start_block.into(),
            &[start],
            NodeAttr::Proj(pn::start::M),
        );
        let frame = graph.raw_node(
            Opcode::Proj,
            modes::P,
            start_block.into(),
            &[start],
            NodeAttr::Proj(pn::start::P_FRAME_BASE),
        );
        let args = graph.raw_node(
            Opcode::Proj,
            modes::T,
            start_block.into(),
            &[start],
            NodeAttr::Proj(pn::start::T_ARGS),
        );
        let no_mem = graph.raw_node(Opcode::NoMem, modes::M, start_block.into(), &[], NodeAttr::None);
        let bad = graph.raw_node(Opcode::Bad, modes::BAD, start_block.into(), &[], NodeAttr::None);
        let unknown =
            graph.raw_node(Opcode::Unknown, modes::ANY, start_block.into(), &[], NodeAttr::None);
        let end_block = graph.raw_node(
            Opcode::Block,
            modes::BB,
            Default::default(),
            &[],
            NodeAttr::Block(BlockAttr { matured: false }),
        );
        let end = graph.raw_node(Opcode::End, modes::X, end_block.into(), &[], NodeAttr::None);
        let anchor = graph.raw_node(
            Opcode::Anchor,
            modes::ANY,
            Default::default(),
            &[
                start_block,
                start,
                end_block,
                end,
                frame,
                args,
                initial_mem,
                initial_exec,
                no_mem,
                bad,
                unknown,
            ],
            NodeAttr::None,
        );
        graph.anchors = Anchors {
            anchor,
            start_block,
            start,
            end_block,
            end,
            frame,
            args,
            initial_mem,
            initial_exec,
            no_mem,
            bad,
            unknown,
        };
        graph
    }

    // ------------------------------------------------------------------
    // Node access

    /// The data of a node.
    pub fn node(&self, n: Node) -> &NodeData {
        &self.nodes[n]
    }

    /// The opcode of a node.
    pub fn opcode(&self, n: Node) -> Opcode {
        self.nodes[n].opcode
    }

    /// The mode of a node.
    pub fn mode(&self, n: Node) -> Mode {
        self.nodes[n].mode
    }

    /// The attribute payload of a node.
    pub fn attr(&self, n: Node) -> &NodeAttr {
        &self.nodes[n].attr
    }

    /// The number of inputs of a node.
    pub fn arity(&self, n: Node) -> usize {
        self.nodes[n].ins.len()
    }

    /// The raw input list of a node, `Id` forwarders not skipped.
    pub fn ins_raw(&self, n: Node) -> &[Node] {
        &self.nodes[n].ins
    }

    /// The `i`-th input of a node, `Id` forwarders skipped.
    pub fn get_in(&self, n: Node, i: usize) -> Node {
        self.skip_id(self.nodes[n].ins[i])
    }

    /// The block a node belongs to. `None` for blocks and the anchor.
    pub fn block(&self, n: Node) -> Option<Node> {
        self.nodes[n].block.expand().map(|b| self.skip_id(b))
    }

    /// The block of a node that is known to have one.
    pub fn block_of(&self, n: Node) -> Node {
        self.block(n).expect("node has no block")
    }

    /// Follow `Id` forwarders to the real node.
    pub fn skip_id(&self, mut n: Node) -> Node {
        while self.nodes[n].opcode == Opcode::Id {
            n = self.nodes[n].ins[0];
        }
        n
    }

    /// Is `n` a `Block`?
    pub fn is_block(&self, n: Node) -> bool {
        self.nodes[n].opcode == Opcode::Block
    }

    /// Is `n` the `Bad` sentinel or a `Bad` replacement value?
    pub fn is_bad(&self, n: Node) -> bool {
        self.nodes[n].opcode == Opcode::Bad
    }

    /// Is the block `b` matured?
    pub fn is_matured(&self, b: Node) -> bool {
        match self.nodes[b].attr {
            NodeAttr::Block(BlockAttr { matured }) => matured,
            _ => panic!("{} is not a block", b),
        }
    }

    /// The constant value of a `Const` node.
    pub fn const_value(&self, n: Node) -> Tarval {
        match self.nodes[n].attr {
            NodeAttr::Const(tv) => tv,
            _ => panic!("{} is not a Const", n),
        }
    }

    /// The projection number of a `Proj` node.
    pub fn proj_num(&self, n: Node) -> u32 {
        match self.nodes[n].attr {
            NodeAttr::Proj(num) => num,
            _ => panic!("{} is not a Proj", n),
        }
    }

    /// Iterate over every node slot ever allocated, dead ones included.
    pub fn nodes(&self) -> Keys<Node> {
        self.nodes.keys()
    }

    /// The number of node slots allocated, a cheap size estimate.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    // ------------------------------------------------------------------
    // Anchor access

    /// The start block.
    pub fn start_block(&self) -> Node {
        self.skip_id(self.anchors.start_block)
    }

    /// The end block.
    pub fn end_block(&self) -> Node {
        self.skip_id(self.anchors.end_block)
    }

    /// The `Start` node.
    pub fn start(&self) -> Node {
        self.skip_id(self.anchors.start)
    }

    /// The `End` node.
    pub fn end(&self) -> Node {
        self.skip_id(self.anchors.end)
    }

    /// The frame base pointer.
    pub fn frame(&self) -> Node {
        self.skip_id(self.anchors.frame)
    }

    /// The argument tuple.
    pub fn args(&self) -> Node {
        self.skip_id(self.anchors.args)
    }

    /// The initial memory.
    pub fn initial_mem(&self) -> Node {
        self.skip_id(self.anchors.initial_mem)
    }

    /// The initial control flow token.
    pub fn initial_exec(&self) -> Node {
        self.skip_id(self.anchors.initial_exec)
    }

    /// The `NoMem` sentinel.
    pub fn no_mem(&self) -> Node {
        self.anchors.no_mem
    }

    // ------------------------------------------------------------------
    // Mutation

    pub(crate) fn raw_node(
        &mut self,
        opcode: Opcode,
        mode: Mode,
        block: PackedOption<Node>,
        ins: &[Node],
        attr: NodeAttr,
    ) -> Node {
        let n = self.nodes.push(NodeData::new(opcode, mode, block, ins, attr));
        let kind = if opcode == Opcode::Block {
            EdgeKind::Block
        } else {
            EdgeKind::Normal
        };
        if self.edges.active(kind) {
            for (pos, &tgt) in ins.iter().enumerate() {
                self.edges.notify(kind, n, pos as u32, None, Some(tgt));
            }
        }
        n
    }

    fn edge_kind_of(&self, src: Node) -> EdgeKind {
        if self.is_block(src) {
            EdgeKind::Block
        } else {
            EdgeKind::Normal
        }
    }

    /// Re-point input `pos` of `src` to `new`, maintaining edges.
    pub fn set_in(&mut self, src: Node, pos: usize, new: Node) {
        let old = self.nodes[src].ins[pos];
        if old == new {
            return;
        }
        self.nodes[src].ins[pos] = new;
        let kind = self.edge_kind_of(src);
        self.edges.notify(kind, src, pos as u32, Some(old), Some(new));
    }

    /// Replace the whole input list of `src`.
    pub fn set_ins(&mut self, src: Node, new: &[Node]) {
        let kind = self.edge_kind_of(src);
        let old: Vec<Node> = self.nodes[src].ins.iter().cloned().collect();
        for (pos, &tgt) in old.iter().enumerate() {
            self.edges.notify(kind, src, pos as u32, Some(tgt), None);
        }
        self.nodes[src].ins.clear();
        self.nodes[src].ins.extend_from_slice(new);
        for (pos, &tgt) in new.iter().enumerate() {
            self.edges.notify(kind, src, pos as u32, None, Some(tgt));
        }
    }

    /// Append an input to a dynamic-arity node.
    pub fn add_in(&mut self, src: Node, new: Node) {
        let pos = self.nodes[src].ins.len() as u32;
        self.nodes[src].ins.push(new);
        let kind = self.edge_kind_of(src);
        self.edges.notify(kind, src, pos, None, Some(new));
    }

    /// Move a node to another block.
    pub fn set_block(&mut self, n: Node, block: Node) {
        debug_assert!(self.is_block(block));
        self.nodes[n].block = block.into();
    }

    /// Replace `old` by `new` everywhere.
    ///
    /// With active def–use edges the users are re-pointed immediately;
    /// otherwise `old` becomes an `Id` forwarder that accessors skip.
    pub fn exchange(&mut self, old: Node, new: Node) {
        let new = self.skip_id(new);
        if self.skip_id(old) == new || old == new {
            return;
        }
        debug_assert!(
            !self.is_block(old) || self.is_block(new) || self.is_bad(new),
            "exchanging a block for a non-block"
        );
        for kind in &[EdgeKind::Normal, EdgeKind::Block] {
            if !self.edges.active(*kind) {
                continue;
            }
            let users: Vec<Edge> = self.edges.outs(*kind, old).to_vec();
            for edge in users {
                self.set_in(edge.src, edge.pos as usize, new);
            }
        }
        // Leave a forwarder for references the edge tables don't cover
        // (block fields, stale identity entries, inactive kinds).
        self.set_ins(old, &[]);
        let data = &mut self.nodes[old];
        data.opcode = Opcode::Id;
        data.attr = NodeAttr::None;
        self.add_in(old, new);
    }

    /// Keep `n` alive by adding it to End's keep-alive list.
    pub fn keep_alive(&mut self, n: Node) {
        let end = self.end();
        if self.nodes[end].ins.iter().any(|&k| k == n) {
            return;
        }
        self.add_in(end, n);
    }

    /// Drop `n` from End's keep-alive list if present.
    pub fn remove_keep_alive(&mut self, n: Node) {
        let end = self.end();
        let kept: Vec<Node> = self
            .nodes[end]
            .ins
            .iter()
            .cloned()
            .filter(|&k| self.skip_id(k) != n && k != n)
            .collect();
        if kept.len() != self.arity(end) {
            self.set_ins(end, &kept);
        }
    }

    // ------------------------------------------------------------------
    // Def–use edges

    /// Are edges of `kind` being maintained?
    pub fn edges_active(&self, kind: EdgeKind) -> bool {
        self.edges.active(kind)
    }

    /// The normal-kind users of `n`: `(user, pos)` records.
    pub fn users(&self, n: Node) -> &[Edge] {
        self.edges.outs(EdgeKind::Normal, n)
    }

    /// The block-kind users of `n`: blocks having `n` as a cfg pred.
    pub fn block_users(&self, n: Node) -> &[Edge] {
        self.edges.outs(EdgeKind::Block, n)
    }

    // ------------------------------------------------------------------
    // Resources

    /// Claim per-node side channels. Panics if any is already claimed.
    pub fn reserve_resources(&mut self, res: Resources) {
        assert!(
            (self.reserved & res).is_empty(),
            "resources {:?} already reserved",
            self.reserved & res
        );
        self.reserved |= res;
    }

    /// Release previously claimed side channels.
    pub fn release_resources(&mut self, res: Resources) {
        assert!(
            self.reserved.contains(res),
            "releasing resources {:?} that were not reserved",
            res
        );
        self.reserved &= !res;
    }

    // ------------------------------------------------------------------
    // Block constructors

    /// Create a matured block with the given control flow predecessors.
    pub fn new_block(&mut self, preds: &[Node]) -> Node {
        self.raw_node(
            Opcode::Block,
            modes::BB,
            Default::default(),
            preds,
            NodeAttr::Block(BlockAttr { matured: true }),
        )
    }

    /// Create an immature block: predecessors are added later with
    /// [`Graph::add_block_pred`] and frozen with [`Graph::mature_block`].
    pub fn new_imm_block(&mut self) -> Node {
        self.raw_node(
            Opcode::Block,
            modes::BB,
            Default::default(),
            &[],
            NodeAttr::Block(BlockAttr { matured: false }),
        )
    }

    /// Add a control flow predecessor to an immature block.
    pub fn add_block_pred(&mut self, block: Node, pred: Node) {
        assert!(
            !self.is_matured(block),
            "adding a predecessor to matured block {}",
            block
        );
        self.add_in(block, pred);
    }

    /// Fix the predecessor count of a block permanently. Idempotent.
    pub fn mature_block(&mut self, block: Node) {
        if self.is_matured(block) {
            return;
        }
        self.nodes[block].attr = NodeAttr::Block(BlockAttr { matured: true });
        crate::opt::local::optimize_in_place(self, block);
    }

    // ------------------------------------------------------------------
    // Control flow constructors

    /// Unconditional jump out of `block`.
    pub fn new_jmp(&mut self, block: Node) -> Node {
        let n = self.raw_node(Opcode::Jmp, modes::X, block.into(), &[], NodeAttr::None);
        self.opt(n)
    }

    /// Two-way branch on a boolean `selector`.
    pub fn new_cond(&mut self, block: Node, selector: Node) -> Node {
        let n = self.raw_node(Opcode::Cond, modes::T, block.into(), &[selector], NodeAttr::None);
        self.opt(n)
    }

    /// Multi-way branch on an integer `selector`.
    pub fn new_switch(&mut self, block: Node, selector: Node, table: SwitchTable) -> Node {
        let n = self.raw_node(
            Opcode::Switch,
            modes::T,
            block.into(),
            &[selector],
            NodeAttr::Switch(table),
        );
        self.opt(n)
    }

    /// Return from the procedure with `results`.
    pub fn new_return(&mut self, block: Node, mem: Node, results: &[Node]) -> Node {
        let mut ins = Vec::with_capacity(1 + results.len());
        ins.push(mem);
        ins.extend_from_slice(results);
        let n = self.raw_node(Opcode::Return, modes::X, block.into(), &ins, NodeAttr::None);
        self.opt(n)
    }

    /// Raise an exception carrying the exception object `exo`.
    pub fn new_raise(&mut self, block: Node, mem: Node, exo: Node) -> Node {
        let n = self.raw_node(Opcode::Raise, modes::X, block.into(), &[mem, exo], NodeAttr::None);
        self.opt(n)
    }

    // ------------------------------------------------------------------
    // Value constructors

    /// A constant. Constants live in the start block and are always CSE'd.
    pub fn new_const(&mut self, value: Tarval) -> Node {
        let block = self.start_block();
        let n = self.raw_node(
            Opcode::Const,
            value.mode(),
            block.into(),
            &[],
            NodeAttr::Const(value),
        );
        self.opt(n)
    }

    /// A symbolic constant of the given mode.
    pub fn new_symconst(&mut self, kind: SymConstKind, mode: Mode) -> Node {
        let block = self.start_block();
        let n = self.raw_node(
            Opcode::SymConst,
            mode,
            block.into(),
            &[],
            NodeAttr::SymConst(kind),
        );
        self.opt(n)
    }

    /// A `Bad` value of the given mode.
    pub fn new_bad(&mut self, mode: Mode) -> Node {
        if mode == modes::BAD {
            return self.anchors.bad;
        }
        let block = self.start_block();
        let n = self.raw_node(Opcode::Bad, mode, block.into(), &[], NodeAttr::None);
        self.opt(n)
    }

    /// An `Unknown` value of the given mode.
    pub fn new_unknown(&mut self, mode: Mode) -> Node {
        let block = self.start_block();
        let n = self.raw_node(Opcode::Unknown, mode, block.into(), &[], NodeAttr::None);
        self.opt(n)
    }

    /// The address of the member `entity` of the compound at `ptr`, with
    /// explicit `indexes` for array entities.
    pub fn new_sel(&mut self, block: Node, ptr: Node, indexes: &[Node], entity: Entity) -> Node {
        let mut ins = Vec::with_capacity(1 + indexes.len());
        ins.push(ptr);
        ins.extend_from_slice(indexes);
        let n = self.raw_node(Opcode::Sel, modes::P, block.into(), &ins, NodeAttr::Sel(entity));
        self.opt(n)
    }

    /// A call of the method at address `callee` with signature `ty`.
    pub fn new_call(
        &mut self,
        block: Node,
        mem: Node,
        callee: Node,
        args: &[Node],
        ty: TypeRef,
    ) -> Node {
        let mut ins = Vec::with_capacity(2 + args.len());
        ins.push(mem);
        ins.push(callee);
        ins.extend_from_slice(args);
        let n = self.raw_node(Opcode::Call, modes::T, block.into(), &ins, NodeAttr::Call(ty));
        self.opt(n)
    }

    /// A memory read producing a value of `mode`.
    pub fn new_load(&mut self, block: Node, mem: Node, ptr: Node, mode: Mode) -> Node {
        self.new_load_volatility(block, mem, ptr, mode, Volatility::NonVolatile)
    }

    /// A memory read with explicit volatility.
    pub fn new_load_volatility(
        &mut self,
        block: Node,
        mem: Node,
        ptr: Node,
        mode: Mode,
        volatility: Volatility,
    ) -> Node {
        let n = self.raw_node(
            Opcode::Load,
            modes::T,
            block.into(),
            &[mem, ptr],
            NodeAttr::Load { mode, volatility },
        );
        self.opt(n)
    }

    /// A memory write.
    pub fn new_store(&mut self, block: Node, mem: Node, ptr: Node, value: Node) -> Node {
        self.new_store_volatility(block, mem, ptr, value, Volatility::NonVolatile)
    }

    /// A memory write with explicit volatility.
    pub fn new_store_volatility(
        &mut self,
        block: Node,
        mem: Node,
        ptr: Node,
        value: Node,
        volatility: Volatility,
    ) -> Node {
        let n = self.raw_node(
            Opcode::Store,
            modes::T,
            block.into(),
            &[mem, ptr, value],
            NodeAttr::Store { volatility },
        );
        self.opt(n)
    }

    /// Merge several memory values into one.
    pub fn new_sync(&mut self, block: Node, mems: &[Node]) -> Node {
        let n = self.raw_node(Opcode::Sync, modes::M, block.into(), mems, NodeAttr::None);
        self.opt(n)
    }

    /// Allocate `count` elements of `ty` on the stack or heap.
    pub fn new_alloc(
        &mut self,
        block: Node,
        mem: Node,
        count: Node,
        ty: TypeRef,
        kind: AllocKind,
    ) -> Node {
        let n = self.raw_node(
            Opcode::Alloc,
            modes::T,
            block.into(),
            &[mem, count],
            NodeAttr::Alloc { ty, kind },
        );
        self.opt(n)
    }

    /// Release memory obtained from `Alloc`.
    pub fn new_free(&mut self, block: Node, mem: Node, ptr: Node, ty: TypeRef) -> Node {
        let n = self.raw_node(Opcode::Free, modes::M, block.into(), &[mem, ptr], NodeAttr::Free(ty));
        self.opt(n)
    }

    /// Copy a compound of type `ty` from `src` to `dst`.
    pub fn new_copyb(
        &mut self,
        block: Node,
        mem: Node,
        dst: Node,
        src: Node,
        ty: TypeRef,
    ) -> Node {
        let n = self.raw_node(
            Opcode::CopyB,
            modes::M,
            block.into(),
            &[mem, dst, src],
            NodeAttr::CopyB(ty),
        );
        self.opt(n)
    }

    /// An SSA join with explicit operands, one per block predecessor.
    pub fn new_phi(&mut self, block: Node, ins: &[Node], mode: Mode) -> Node {
        let n = self.raw_node(Opcode::Phi, mode, block.into(), ins, NodeAttr::None);
        self.opt(n)
    }

    /// A Phi placeholder with no operands yet; complete it later with
    /// [`Graph::set_phi_arguments`]. Not subject to identity rules.
    pub fn new_phi0(&mut self, block: Node, mode: Mode) -> Node {
        self.raw_node(Opcode::Phi, mode, block.into(), &[], NodeAttr::None)
    }

    /// Fill in the operands of a Phi placeholder. The placeholder may
    /// collapse to an existing value; the surviving node is returned and
    /// the placeholder, if collapsed, forwards to it.
    pub fn set_phi_arguments(&mut self, phi: Node, ins: &[Node]) -> Node {
        debug_assert_eq!(self.opcode(phi), Opcode::Phi);
        debug_assert_eq!(self.arity(phi), 0, "Phi {} already has arguments", phi);
        self.set_ins(phi, ins);
        let opt = crate::opt::local::optimize_node(self, phi);
        if opt != phi {
            self.exchange(phi, opt);
        }
        opt
    }

    /// Select component `num` of the tuple `pred`.
    pub fn new_proj(&mut self, pred: Node, mode: Mode, num: u32) -> Node {
        let block = self.nodes[pred].block;
        let n = self.raw_node(Opcode::Proj, mode, block, &[pred], NodeAttr::Proj(num));
        self.opt(n)
    }

    /// A tuple of values.
    pub fn new_tuple(&mut self, block: Node, ins: &[Node]) -> Node {
        let n = self.raw_node(Opcode::Tuple, modes::T, block.into(), ins, NodeAttr::None);
        self.opt(n)
    }

    /// Assert that `relation` holds between `value` and `bound`.
    pub fn new_confirm(&mut self, block: Node, value: Node, bound: Node, relation: Relation) -> Node {
        let mode = self.mode(value);
        let n = self.raw_node(
            Opcode::Confirm,
            mode,
            block.into(),
            &[value, bound],
            NodeAttr::Confirm(relation),
        );
        self.opt(n)
    }

    /// Select `if_true` when `selector` is true, `if_false` otherwise.
    pub fn new_mux(
        &mut self,
        block: Node,
        selector: Node,
        if_false: Node,
        if_true: Node,
        mode: Mode,
    ) -> Node {
        let n = self.raw_node(
            Opcode::Mux,
            mode,
            block.into(),
            &[selector, if_false, if_true],
            NodeAttr::None,
        );
        self.opt(n)
    }

    // ------------------------------------------------------------------
    // Arithmetic constructors

    fn new_binop(&mut self, opcode: Opcode, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        let n = self.raw_node(opcode, mode, block.into(), &[l, r], NodeAttr::None);
        self.opt(n)
    }

    fn new_unop(&mut self, opcode: Opcode, block: Node, op: Node, mode: Mode) -> Node {
        let n = self.raw_node(opcode, mode, block.into(), &[op], NodeAttr::None);
        self.opt(n)
    }

    /// Addition.
    pub fn new_add(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Add, block, l, r, mode)
    }

    /// Subtraction.
    pub fn new_sub(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Sub, block, l, r, mode)
    }

    /// Multiplication.
    pub fn new_mul(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Mul, block, l, r, mode)
    }

    /// High half of the double-width product.
    pub fn new_mulh(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Mulh, block, l, r, mode)
    }

    /// Division with memory, producing a tuple.
    pub fn new_div(&mut self, block: Node, mem: Node, l: Node, r: Node, res_mode: Mode) -> Node {
        let n = self.raw_node(
            Opcode::Div,
            modes::T,
            block.into(),
            &[mem, l, r],
            NodeAttr::DivMod { res_mode },
        );
        self.opt(n)
    }

    /// Remainder with memory, producing a tuple.
    pub fn new_mod(&mut self, block: Node, mem: Node, l: Node, r: Node, res_mode: Mode) -> Node {
        let n = self.raw_node(
            Opcode::Mod,
            modes::T,
            block.into(),
            &[mem, l, r],
            NodeAttr::DivMod { res_mode },
        );
        self.opt(n)
    }

    /// Arithmetic negation.
    pub fn new_minus(&mut self, block: Node, op: Node, mode: Mode) -> Node {
        self.new_unop(Opcode::Minus, block, op, mode)
    }

    /// Absolute value.
    pub fn new_abs(&mut self, block: Node, op: Node, mode: Mode) -> Node {
        self.new_unop(Opcode::Abs, block, op, mode)
    }

    /// Bitwise and.
    pub fn new_and(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::And, block, l, r, mode)
    }

    /// Bitwise or.
    pub fn new_or(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Or, block, l, r, mode)
    }

    /// Bitwise exclusive or.
    pub fn new_eor(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Eor, block, l, r, mode)
    }

    /// Bitwise complement.
    pub fn new_not(&mut self, block: Node, op: Node, mode: Mode) -> Node {
        self.new_unop(Opcode::Not, block, op, mode)
    }

    /// Shift left.
    pub fn new_shl(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Shl, block, l, r, mode)
    }

    /// Logical shift right.
    pub fn new_shr(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Shr, block, l, r, mode)
    }

    /// Arithmetic shift right.
    pub fn new_shrs(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Shrs, block, l, r, mode)
    }

    /// Rotate left.
    pub fn new_rotl(&mut self, block: Node, l: Node, r: Node, mode: Mode) -> Node {
        self.new_binop(Opcode::Rotl, block, l, r, mode)
    }

    /// Compare `l` and `r` against `relation`, producing mode `b`.
    pub fn new_cmp(&mut self, block: Node, l: Node, r: Node, relation: Relation) -> Node {
        let n = self.raw_node(
            Opcode::Cmp,
            modes::B,
            block.into(),
            &[l, r],
            NodeAttr::Cmp(relation),
        );
        self.opt(n)
    }

    /// Convert `op` to `mode`.
    pub fn new_conv(&mut self, block: Node, op: Node, mode: Mode) -> Node {
        let n = self.raw_node(Opcode::Conv, mode, block.into(), &[op], NodeAttr::None);
        self.opt(n)
    }

    fn opt(&mut self, n: Node) -> Node {
        crate::opt::local::optimize_node(self, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges;
    use crate::ir::types::{CompoundKind, TypeStore};

    fn test_graph() -> Graph {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        Graph::new(Flags::none(), frame)
    }

    #[test]
    fn anchors_are_wired() {
        let g = test_graph();
        assert_eq!(g.opcode(g.start()), Opcode::Start);
        assert_eq!(g.opcode(g.end()), Opcode::End);
        assert_eq!(g.opcode(g.start_block()), Opcode::Block);
        assert_eq!(g.mode(g.initial_mem()), modes::M);
        assert_eq!(g.mode(g.frame()), modes::P);
        assert_eq!(g.block(g.start()), Some(g.start_block()));
        assert!(g.is_matured(g.start_block()));
        assert!(!g.is_matured(g.end_block()));
    }

    #[test]
    fn exchange_without_edges_leaves_id() {
        let mut g = test_graph();
        let block = g.start_block();
        let a = g.new_const(Tarval::new_int(modes::IS32, 1));
        let b = g.new_const(Tarval::new_int(modes::IS32, 2));
        let sum = g.new_add(block, a, b, modes::IS32);

        let c = g.new_const(Tarval::new_int(modes::IS32, 3));
        g.exchange(sum, c);
        assert_eq!(g.opcode(sum), Opcode::Id);
        assert_eq!(g.skip_id(sum), c);
    }

    #[test]
    fn exchange_with_edges_repoints_users() {
        let mut g = test_graph();
        let block = g.start_block();
        let a = g.new_const(Tarval::new_int(modes::IS32, 1));
        let b = g.new_const(Tarval::new_int(modes::IS32, 2));
        let sum = g.new_add(block, a, b, modes::IS32);
        let neg = g.new_minus(block, sum, modes::IS32);

        edges::activate(&mut g, edges::EdgeKind::Normal);
        let c = g.new_const(Tarval::new_int(modes::IS32, 3));
        g.exchange(sum, c);
        assert_eq!(g.ins_raw(neg)[0], c);
        assert!(edges::verify(&g, edges::EdgeKind::Normal));
    }

    #[test]
    fn keep_alive_round_trip() {
        let mut g = test_graph();
        let block = g.start_block();
        let c = g.new_const(Tarval::new_int(modes::IS32, 1));
        g.keep_alive(c);
        g.keep_alive(c);
        assert_eq!(g.arity(g.end()), 1);
        g.remove_keep_alive(c);
        assert_eq!(g.arity(g.end()), 0);
        let _ = block;
    }

    #[test]
    #[should_panic(expected = "matured")]
    fn add_pred_to_matured_block_panics() {
        let mut g = test_graph();
        let b = g.new_imm_block();
        g.mature_block(b);
        let jmp = g.new_jmp(g.start_block());
        g.add_block_pred(b, jmp);
    }

    #[test]
    #[should_panic(expected = "already reserved")]
    fn double_reservation_panics() {
        let mut g = test_graph();
        g.reserve_resources(Resources::VISITED);
        g.reserve_resources(Resources::VISITED | Resources::LINK);
    }

    #[test]
    fn resource_release() {
        let mut g = test_graph();
        g.reserve_resources(Resources::VISITED);
        g.release_resources(Resources::VISITED);
        g.reserve_resources(Resources::VISITED);
    }

    #[test]
    fn clone_is_independent() {
        let mut g = test_graph();
        let block = g.start_block();
        let c = g.new_const(Tarval::new_int(modes::IS32, 4));
        let mut h = g.clone();
        let d = h.new_const(Tarval::new_int(modes::IS32, 5));
        assert!(g.n_nodes() < h.n_nodes());
        let _ = (block, c, d);
    }
}
