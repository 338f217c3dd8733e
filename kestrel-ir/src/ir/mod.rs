//! The IR data model: modes, tarvals, types, entities, nodes, graphs and
//! the program.

pub mod entities;
pub mod graph;
pub mod modes;
pub mod node;
pub mod opcode;
pub mod program;
pub mod tarval;
pub mod types;

pub use self::entities::{AnyEntity, Entity, GraphRef, Ident, Node, TypeRef};
pub use self::graph::{Anchors, Graph, GraphProperties, Phase, Resources, StateInfo};
pub use self::modes::Mode;
pub use self::node::{AllocKind, NodeAttr, SwitchEntry, SwitchTable, SymConstKind};
pub use self::opcode::{Arity, OpFlags, Opcode, OpcodeRegistry, PinState};
pub use self::program::Program;
pub use self::tarval::{Relation, Tarval};
pub use self::types::TypeStore;
