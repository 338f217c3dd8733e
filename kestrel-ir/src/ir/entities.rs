//! Kestrel IR entity references.
//!
//! Objects in the IR reference each other through compact typed indices
//! rather than Rust references: the node graph is cyclic, and a `u32` index
//! is half the size of a pointer. Each entity kind gets its own index type
//! so the type system keeps them apart. The `Display` implementations match
//! the textual dump format (`n12`, `g3`, `ty7`, ...).

use core::fmt;
use kestrel_entity::entity_impl;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// An opaque reference to a node in a procedure graph.
///
/// Blocks are nodes too: a `Node` may refer to a `Block`-opcode node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Node(u32);
entity_impl!(Node, "n");

/// An opaque reference to a procedure graph in a program.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct GraphRef(u32);
entity_impl!(GraphRef, "g");

/// An opaque reference to a type descriptor in the program's type store.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct TypeRef(u32);
entity_impl!(TypeRef, "ty");

/// An opaque reference to an entity: a named storage location or method
/// member of an owner type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Entity(u32);
entity_impl!(Entity, "ent");

/// An opaque reference to an interned identifier string.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Ident(u32);
entity_impl!(Ident, "id");

/// A reference to any of the entities defined in this module, used by the
/// verifier to locate a diagnostic.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum AnyEntity {
    /// The whole graph.
    Graph,
    /// A node.
    Node(Node),
    /// A type descriptor.
    Type(TypeRef),
    /// An entity.
    Entity(Entity),
}

impl fmt::Display for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AnyEntity::Graph => write!(f, "graph"),
            AnyEntity::Node(r) => r.fmt(f),
            AnyEntity::Type(r) => r.fmt(f),
            AnyEntity::Entity(r) => r.fmt(f),
        }
    }
}

impl fmt::Debug for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

impl From<Node> for AnyEntity {
    fn from(r: Node) -> Self {
        AnyEntity::Node(r)
    }
}

impl From<TypeRef> for AnyEntity {
    fn from(r: TypeRef) -> Self {
        AnyEntity::Type(r)
    }
}

impl From<Entity> for AnyEntity {
    fn from(r: Entity) -> Self {
        AnyEntity::Entity(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_entity::packed_option::PackedOption;
    use kestrel_entity::EntityRef;

    #[test]
    fn display() {
        assert_eq!(Node::new(0).to_string(), "n0");
        assert_eq!(GraphRef::new(1).to_string(), "g1");
        assert_eq!(TypeRef::new(2).to_string(), "ty2");
        assert_eq!(Entity::new(3).to_string(), "ent3");
    }

    #[test]
    fn memory() {
        use core::mem;
        // This is the whole point of `PackedOption`.
        assert_eq!(
            mem::size_of::<Node>(),
            mem::size_of::<PackedOption<Node>>()
        );
    }
}
