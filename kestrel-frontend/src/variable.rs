//! A front-end variable.

use core::u32;
use kestrel_ir::entity::entity_impl;

/// An opaque reference to a mutable variable of the language being
/// translated. Variables are densely numbered by the front end; the
/// builder maps them onto SSA values per block.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(u32);
entity_impl!(Variable, "var");

impl Variable {
    /// Create a variable with the given index.
    pub fn with_u32(index: u32) -> Self {
        debug_assert!(index < u32::MAX);
        Variable(index)
    }
}
