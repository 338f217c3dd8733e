//! Array-based data structures indexed by small, typed entity references.
//!
//! IR objects reference each other with plain `u32` indices wrapped in
//! per-entity newtypes instead of Rust references: the graphs are cyclic,
//! the indices are half the size of a pointer, and a separate index type per
//! entity keeps the type safety. The `entity_impl!` macro generates the
//! boilerplate for such a reference type; `PrimaryMap` allocates them and
//! `SecondaryMap` attaches side information to them.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]

pub mod packed_option;

mod keys;
mod map;
mod primary;
mod set;

pub use crate::keys::Keys;
pub use crate::map::SecondaryMap;
pub use crate::primary::PrimaryMap;
pub use crate::set::EntitySet;

/// A type wrapping a small integer index should implement `EntityRef` so it
/// can be used as the key of an entity map or set.
pub trait EntityRef: Copy + Eq {
    /// Create a new entity reference from a small integer.
    /// This should crash if the requested index is not representable.
    fn new(_: usize) -> Self;

    /// Get the index that was used to create this entity reference.
    fn index(self) -> usize;
}

/// Macro which provides the common implementation of a 32-bit entity
/// reference: the `EntityRef` trait, a reserved-value aware constructor, and
/// `Display`/`Debug` using a short prefix, e.g. `n12` for node 12.
///
/// The index `u32::MAX` is reserved so `PackedOption` can use it as `None`.
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (::core::u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $crate::packed_option::ReservedValue for $entity {
            fn reserved_value() -> $entity {
                $entity(::core::u32::MAX)
            }
        }

        impl $entity {
            /// Create a new entity reference from its number.
            /// Returns `None` if the number is reserved.
            #[allow(dead_code)]
            pub fn from_u32(x: u32) -> Option<Self> {
                if x < ::core::u32::MAX {
                    Some($entity(x))
                } else {
                    None
                }
            }

            /// Return the underlying index value as a `u32`.
            #[allow(dead_code)]
            pub fn as_u32(self) -> u32 {
                self.0
            }
        }
    };

    ($entity:ident, $display_prefix:expr) => {
        entity_impl!($entity);

        impl ::core::fmt::Display for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                write!(f, concat!($display_prefix, "{}"), self.0)
            }
        }

        impl ::core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                (self as &dyn ::core::fmt::Display).fmt(f)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::EntityRef;

    #[derive(Copy, Clone, PartialEq, Eq, Hash)]
    struct E(u32);
    entity_impl!(E, "e");

    #[test]
    fn display() {
        assert_eq!(E::new(3).to_string(), "e3");
        assert_eq!(format!("{:?}", E::new(3)), "e3");
    }

    #[test]
    fn reserved() {
        assert_eq!(E::from_u32(core::u32::MAX), None);
        assert!(E::from_u32(core::u32::MAX - 1).is_some());
    }
}
