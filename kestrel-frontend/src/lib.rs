//! A frontend for building Kestrel IR from other languages.
//!
//! The `GraphBuilder` hides the SSA discipline of the IR: a front end works
//! with mutable variables and a single memory state, and the builder tracks
//! the current SSA value per block, inserting the minimally necessary Phi
//! nodes when blocks mature.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

mod builder;
mod variable;

pub use crate::builder::{GraphBuilder, GraphBuilderContext};
pub use crate::variable::Variable;
