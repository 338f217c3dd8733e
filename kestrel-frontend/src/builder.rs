//! Incremental SSA construction.
//!
//! A `GraphBuilder` lets a front end mutate variables and the memory state
//! freely while it walks its AST; the builder tracks the current SSA value
//! of every variable per block and synthesizes the minimally necessary Phi
//! nodes when control flow joins.
//!
//! Blocks start out *immature*: predecessors may still be added, so a
//! variable read in an immature block yields a Phi placeholder that is
//! completed when the block matures. Reading in a matured block recurses
//! into the predecessors, inserting a placeholder first to terminate
//! cycles through loops. Call [`GraphBuilder::mature_block`] as soon as a
//! block's last predecessor exists; maturing early keeps the Phi count
//! minimal, and every block must be matured before `finalize`.

use crate::variable::Variable;
use kestrel_ir::entity::packed_option::PackedOption;
use kestrel_ir::entity::SecondaryMap;
use kestrel_ir::ir::graph::Resources;
use kestrel_ir::ir::modes::{self, Mode};
use kestrel_ir::ir::opcode::pn;
use kestrel_ir::ir::{Graph, Node};
use std::collections::HashMap;

/// What a per-block SSA slot tracks: the memory thread or a variable.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
enum Slot {
    /// The memory state.
    Store,
    /// A front-end variable.
    Var(Variable),
}

/// State kept between the functions built with the same context, so the
/// hash maps keep their allocations.
pub struct GraphBuilderContext {
    defs: HashMap<(Node, Slot), Node>,
    phi_lists: HashMap<Node, Vec<(Node, Slot)>>,
    modes: SecondaryMap<Variable, Mode>,
}

impl GraphBuilderContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            defs: HashMap::new(),
            phi_lists: HashMap::new(),
            modes: SecondaryMap::new(),
        }
    }

    fn clear(&mut self) {
        self.defs.clear();
        self.phi_lists.clear();
        self.modes.clear();
    }

    fn is_empty(&self) -> bool {
        self.defs.is_empty() && self.phi_lists.is_empty() && self.modes.is_empty()
    }
}

impl Default for GraphBuilderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds one procedure graph in SSA form.
pub struct GraphBuilder<'a> {
    /// The graph being built. Public so node constructors can be called
    /// directly between builder operations.
    pub graph: &'a mut Graph,
    ctx: &'a mut GraphBuilderContext,
    position: PackedOption<Node>,
    finalized: bool,
}

impl<'a> GraphBuilder<'a> {
    /// Start building into `graph`. The memory thread of the start block is
    /// the graph's initial memory.
    pub fn new(graph: &'a mut Graph, ctx: &'a mut GraphBuilderContext) -> Self {
        debug_assert!(ctx.is_empty());
        graph.reserve_resources(Resources::PHI_LIST);
        let start_block = graph.start_block();
        let initial_mem = graph.initial_mem();
        ctx.defs.insert((start_block, Slot::Store), initial_mem);
        Self {
            graph,
            ctx,
            position: start_block.into(),
            finalized: false,
        }
    }

    /// The block new nodes belong to.
    pub fn current_block(&self) -> Node {
        self.position.expect("no current block")
    }

    /// Create a new immature block.
    pub fn create_block(&mut self) -> Node {
        let block = self.graph.new_imm_block();
        self.ctx.phi_lists.insert(block, Vec::new());
        block
    }

    /// Continue construction in `block`.
    pub fn switch_to_block(&mut self, block: Node) {
        debug_assert!(self.graph.is_block(block));
        self.position = block.into();
    }

    /// Add a control flow predecessor to an immature block.
    pub fn add_pred(&mut self, block: Node, pred: Node) {
        self.graph.add_block_pred(block, pred);
    }

    /// Declare the mode of a variable before its first use.
    pub fn declare_var(&mut self, var: Variable, mode: Mode) {
        self.ctx.modes[var] = mode;
    }

    /// Set the current value of a variable.
    pub fn set_value(&mut self, var: Variable, value: Node) {
        let mode = self.ctx.modes[var];
        debug_assert!(
            mode != modes::BAD,
            "variable {} used before declare_var",
            var
        );
        debug_assert_eq!(self.graph.mode(value), mode, "mode mismatch for {}", var);
        let block = self.current_block();
        self.ctx.defs.insert((block, Slot::Var(var)), value);
    }

    /// The current value of a variable, synthesizing Phis as needed.
    pub fn get_value(&mut self, var: Variable) -> Node {
        let mode = self.ctx.modes[var];
        debug_assert!(
            mode != modes::BAD,
            "variable {} used before declare_var",
            var
        );
        let block = self.current_block();
        self.read_slot(block, Slot::Var(var), mode)
    }

    /// Set the current memory state.
    pub fn set_store(&mut self, mem: Node) {
        debug_assert_eq!(self.graph.mode(mem), modes::M, "set_store of a non-memory");
        let block = self.current_block();
        self.ctx.defs.insert((block, Slot::Store), mem);
    }

    /// The current memory state.
    pub fn get_store(&mut self) -> Node {
        let block = self.current_block();
        self.read_slot(block, Slot::Store, modes::M)
    }

    /// Fix the predecessors of `block` and resolve its pending Phi
    /// placeholders. Idempotent.
    pub fn mature_block(&mut self, block: Node) {
        if self.graph.is_matured(block) {
            return;
        }
        self.graph.mature_block(block);
        let pending = self.ctx.phi_lists.remove(&block).unwrap_or_default();
        for (phi, slot) in pending {
            self.resolve_phi(block, phi, slot);
        }
    }

    /// Append a Jmp to the current block targeting `target`.
    pub fn jump(&mut self, target: Node) {
        let block = self.current_block();
        let jmp = self.graph.new_jmp(block);
        self.graph.add_block_pred(target, jmp);
    }

    /// Append a two-way branch on `selector` to the current block.
    pub fn cond_jump(&mut self, selector: Node, if_true: Node, if_false: Node) {
        let block = self.current_block();
        let cond = self.graph.new_cond(block, selector);
        let proj_true = self.graph.new_proj(cond, modes::X, pn::cond::TRUE);
        let proj_false = self.graph.new_proj(cond, modes::X, pn::cond::FALSE);
        self.graph.add_block_pred(if_true, proj_true);
        self.graph.add_block_pred(if_false, proj_false);
    }

    /// Append a Return of `results` to the current block, consuming the
    /// current memory.
    pub fn ret(&mut self, results: &[Node]) {
        let mem = self.get_store();
        let block = self.current_block();
        let ret = self.graph.new_return(block, mem, results);
        let end_block = self.graph.end_block();
        self.graph.add_block_pred(end_block, ret);
    }

    /// Finish construction: matures the end block, flips the graph out of
    /// the building phase and resets the context.
    pub fn finalize(&mut self) {
        debug_assert!(
            self.ctx.phi_lists.values().all(|pending| pending.is_empty()),
            "all blocks must be matured before finalize"
        );
        let end_block = self.graph.end_block();
        self.graph.mature_block(end_block);
        self.graph.phase = kestrel_ir::ir::graph::Phase::High;
        self.ctx.clear();
        self.finalized = true;
        self.graph.release_resources(Resources::PHI_LIST);
    }

    // ------------------------------------------------------------------

    /// The §-algorithm: the current value of `slot` in `block`.
    fn read_slot(&mut self, block: Node, slot: Slot, mode: Mode) -> Node {
        if let Some(&value) = self.ctx.defs.get(&(block, slot)) {
            return self.graph.skip_id(value);
        }
        if !self.graph.is_matured(block) {
            // Predecessors unknown: record a placeholder for mature time.
            let phi = self.graph.new_phi0(block, mode);
            self.ctx
                .phi_lists
                .get_mut(&block)
                .expect("immature block without phi list")
                .push((phi, slot));
            self.ctx.defs.insert((block, slot), phi);
            return phi;
        }
        match self.graph.arity(block) {
            0 => {
                // An entry block read: the memory thread was seeded in
                // `new`, so this is an uninitialized variable (Unknown in
                // the start block) or a read on an unreachable path (Bad).
                let value = if block == self.graph.start_block() {
                    log::debug!("uninitialized read of {:?}", slot);
                    self.graph.new_unknown(mode)
                } else {
                    self.graph.new_bad(mode)
                };
                self.ctx.defs.insert((block, slot), value);
                value
            }
            1 => {
                let pred = self.graph.get_in(block, 0);
                let pred_block = self
                    .graph
                    .block(pred)
                    .expect("control flow value without a block");
                let value = self.read_slot(pred_block, slot, mode);
                self.ctx.defs.insert((block, slot), value);
                value
            }
            _ => {
                // Insert the placeholder first to break cycles, then fill
                // its arguments from the predecessors.
                let phi = self.graph.new_phi0(block, mode);
                self.ctx.defs.insert((block, slot), phi);
                self.resolve_phi(block, phi, slot)
            }
        }
    }

    /// Complete a Phi placeholder with one operand per predecessor; the
    /// placeholder may collapse to an existing value.
    fn resolve_phi(&mut self, block: Node, phi: Node, slot: Slot) -> Node {
        let mode = self.graph.mode(phi);
        let arity = self.graph.arity(block);
        let mut ins = Vec::with_capacity(arity);
        for i in 0..arity {
            let pred = self.graph.get_in(block, i);
            let pred_block = self
                .graph
                .block(pred)
                .expect("control flow value without a block");
            ins.push(self.read_slot(pred_block, slot, mode));
        }
        let result = self.graph.set_phi_arguments(phi, &ins);
        // The placeholder may have been shadowed by a later definition.
        if self.ctx.defs.get(&(block, slot)) == Some(&phi) {
            self.ctx.defs.insert((block, slot), result);
        }
        result
    }
}

impl<'a> Drop for GraphBuilder<'a> {
    fn drop(&mut self) {
        if !self.finalized {
            self.graph.release_resources(Resources::PHI_LIST);
        }
    }
}
