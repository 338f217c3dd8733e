//! The program: all procedure graphs plus the shared stores.

use crate::ir::entities::{Entity, GraphRef, Node, TypeRef};
use crate::ir::node::{NodeAttr, SymConstKind};
use crate::ir::opcode::{Opcode, OpcodeRegistry};
use crate::ir::types::TypeStore;
use crate::ir::Graph;
use crate::settings::Flags;
use kestrel_entity::PrimaryMap;
use std::string::String;

/// A whole program: the ordered list of procedure graphs, the type and
/// entity stores, the opcode registry for back-end dialects, and the
/// process-wide optimizer settings.
#[derive(Clone, Debug)]
pub struct Program {
    /// The program name, used in dumps.
    pub name: String,
    /// All procedure graphs.
    pub graphs: PrimaryMap<GraphRef, Graph>,
    /// Types, entities and interned idents.
    pub types: TypeStore,
    /// Dialect opcode ranges.
    pub opcodes: OpcodeRegistry,
    /// Optimizer settings; copied into each graph at creation.
    pub flags: Flags,
    /// Consistency of interprocedural call graph information.
    pub callgraph_state: crate::ir::graph::StateInfo,
}

impl Program {
    /// Create an empty program with default settings.
    pub fn new(name: &str) -> Self {
        Self::with_flags(name, Flags::default())
    }

    /// Create an empty program with the given settings.
    pub fn with_flags(name: &str, flags: Flags) -> Self {
        Self {
            name: String::from(name),
            graphs: PrimaryMap::new(),
            types: TypeStore::new(),
            opcodes: OpcodeRegistry::new(),
            flags,
            callgraph_state: crate::ir::graph::StateInfo::None,
        }
    }

    /// Create a method entity named `name` of method type `ty` in the
    /// global type, together with a fresh graph implementing it.
    pub fn new_graph(&mut self, name: &str, ty: TypeRef) -> GraphRef {
        let frame_name = format!("{}.frame", name);
        let frame = self
            .types
            .new_compound(crate::ir::types::CompoundKind::Struct, &frame_name);
        let global = self.types.global_type;
        let entity = self.types.new_entity(global, name, ty);
        let mut graph = Graph::new(self.flags, frame);
        graph.entity = entity.into();
        let graph_ref = self.graphs.push(graph);
        self.types.entity_mut(entity).graph = graph_ref.into();
        graph_ref
    }

    /// The entity a graph implements.
    pub fn graph_entity(&self, graph: GraphRef) -> Option<Entity> {
        self.graphs[graph].entity.expand()
    }

    /// The graph a call node calls, when the callee address is a symbolic
    /// constant naming a method entity with a graph.
    pub fn find_callee(&self, caller: GraphRef, call: Node) -> Option<GraphRef> {
        let graph = &self.graphs[caller];
        if graph.opcode(call) != Opcode::Call {
            return None;
        }
        let addr = graph.get_in(call, 1);
        if graph.opcode(addr) != Opcode::SymConst {
            return None;
        }
        match *graph.attr(addr) {
            NodeAttr::SymConst(SymConstKind::Address(entity)) => {
                self.types.entity(entity).graph.expand()
            }
            _ => None,
        }
    }
}
