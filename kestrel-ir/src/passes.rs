//! Pass scheduling.
//!
//! A pass declares the derived graph state it requires and the state it
//! invalidates; the manager repairs what it can (def–use edges can always
//! be rebuilt), refuses to run what it can't, and never silently runs a
//! pass whose preconditions are unmet. After every pass the graph is
//! verified according to its `VerifyMode`.

use crate::edges::EdgeKind;
use crate::ir::graph::StateInfo;
use crate::ir::types::TypeStore;
use crate::ir::Graph;
use crate::settings::VerifyMode;

bitflags! {
    /// Derived per-graph information a pass may depend on.
    pub struct GraphState: u8 {
        /// Def–use edges are active and consistent.
        const OUTS = 0x1;
        /// Dominance information is consistent.
        const DOMS = 0x2;
    }
}

/// An error raised by the pass manager.
#[derive(Fail, Debug, PartialEq, Eq)]
pub enum PassError {
    /// A pass required state the manager cannot provide.
    #[fail(display = "pass '{}' requires {}", pass, state)]
    PreconditionUnmet {
        /// The refusing pass.
        pass: &'static str,
        /// The missing state.
        state: &'static str,
    },
    /// Verification after a pass failed in report mode.
    #[fail(display = "pass '{}' broke the graph: {}", pass, errors)]
    Verification {
        /// The offending pass.
        pass: &'static str,
        /// The collected violations.
        errors: crate::verifier::VerifierErrors,
    },
}

/// A graph transformation with declared state dependencies.
pub trait Pass {
    /// The pass name used in logs and errors.
    fn name(&self) -> &'static str;

    /// The state this pass needs before running.
    fn requires(&self) -> GraphState {
        GraphState::empty()
    }

    /// The state this pass destroys when it changes something.
    fn invalidates(&self) -> GraphState {
        GraphState::all()
    }

    /// Run on one graph; returns whether anything changed.
    fn run(&mut self, graph: &mut Graph, types: &TypeStore) -> bool;
}

/// Runs passes in order, maintaining the state table.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Append a pass.
    pub fn add(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    /// Run all passes on `graph`.
    pub fn run(&mut self, graph: &mut Graph, types: &TypeStore) -> Result<(), PassError> {
        for pass in &mut self.passes {
            let requires = pass.requires();
            if requires.contains(GraphState::OUTS) && !graph.edges_active(EdgeKind::Normal) {
                // Edges are cheap to rebuild; repairing is this pass
                // manager's documented contract for OUTS.
                crate::edges::activate(graph, EdgeKind::Normal);
                crate::edges::activate(graph, EdgeKind::Block);
                graph.outs_state = StateInfo::Consistent;
            }
            if requires.contains(GraphState::DOMS) && graph.doms_state != StateInfo::Consistent {
                return Err(PassError::PreconditionUnmet {
                    pass: pass.name(),
                    state: "doms-consistent",
                });
            }
            log::debug!("running pass '{}'", pass.name());
            let changed = pass.run(graph, types);
            if changed {
                let invalidates = pass.invalidates();
                if invalidates.contains(GraphState::OUTS)
                    && !graph.edges_active(EdgeKind::Normal)
                {
                    graph.outs_state = StateInfo::Inconsistent;
                }
                if invalidates.contains(GraphState::DOMS) {
                    if graph.doms_state == StateInfo::Consistent {
                        graph.doms_state = StateInfo::Inconsistent;
                    }
                }
            }
            match graph.flags.verify {
                VerifyMode::Off => {}
                mode => {
                    if let Err(errors) = crate::verifier::verify_graph_mode(graph, types, mode) {
                        return Err(PassError::Verification {
                            pass: pass.name(),
                            errors,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------
// The built-in passes.

/// One round of the local optimizer over every node.
pub struct LocalOptimize;

impl Pass for LocalOptimize {
    fn name(&self) -> &'static str {
        "local-optimize"
    }

    fn run(&mut self, graph: &mut Graph, _types: &TypeStore) -> bool {
        let before = graph.n_nodes();
        crate::opt::local_optimize_graph(graph);
        graph.n_nodes() != before
    }
}

/// Control flow optimization.
pub struct ControlFlow;

impl Pass for ControlFlow {
    fn name(&self) -> &'static str {
        "control-flow"
    }

    fn requires(&self) -> GraphState {
        GraphState::OUTS
    }

    fn run(&mut self, graph: &mut Graph, _types: &TypeStore) -> bool {
        crate::opt::optimize_cf(graph)
    }
}

/// Arena compaction.
pub struct DeadNodeElimination;

impl Pass for DeadNodeElimination {
    fn name(&self) -> &'static str {
        "dead-node-elimination"
    }

    fn run(&mut self, graph: &mut Graph, _types: &TypeStore) -> bool {
        crate::opt::dead_node_elimination(graph) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{CompoundKind, TypeStore};
    use crate::settings::Flags;

    fn test_graph() -> (Graph, TypeStore) {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        let mut g = Graph::new(Flags::default(), frame);
        // Wire a return so verification passes.
        let b = g.new_block(&[g.initial_exec()]);
        let mem = g.initial_mem();
        let ret = g.new_return(b, mem, &[]);
        let end_block = g.end_block();
        g.add_block_pred(end_block, ret);
        g.mature_block(end_block);
        g.phase = crate::ir::graph::Phase::High;
        (g, store)
    }

    struct NeedsDoms;

    impl Pass for NeedsDoms {
        fn name(&self) -> &'static str {
            "needs-doms"
        }
        fn requires(&self) -> GraphState {
            GraphState::DOMS
        }
        fn run(&mut self, _graph: &mut Graph, _types: &TypeStore) -> bool {
            false
        }
    }

    #[test]
    fn refuses_unmet_precondition() {
        let (mut g, types) = test_graph();
        let mut manager = PassManager::new();
        manager.add(Box::new(NeedsDoms));
        let err = manager.run(&mut g, &types).unwrap_err();
        assert_eq!(
            err,
            PassError::PreconditionUnmet {
                pass: "needs-doms",
                state: "doms-consistent"
            }
        );
    }

    #[test]
    fn repairs_edges_for_cfopt() {
        let (mut g, types) = test_graph();
        let mut manager = PassManager::new();
        manager.add(Box::new(ControlFlow));
        manager.add(Box::new(DeadNodeElimination));
        manager.run(&mut g, &types).unwrap();
    }
}
