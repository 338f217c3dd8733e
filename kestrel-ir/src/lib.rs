//! Kestrel IR: a graph-based SSA intermediate representation with an
//! optimizer core.
//!
//! The library represents each procedure as a graph of nodes in static
//! single assignment form. Nodes are built through constructors that run a
//! local optimizer (algebraic identities, constant folding, value
//! numbering), so many redundancies never materialize. On top of the data
//! model sit the def–use edge tables, a control flow optimizer, a
//! priority-driven function inliner, a verifier and a small pass scheduler.
//!
//! Incremental SSA construction with immature blocks lives in the
//! companion crate `kestrel-frontend`.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate failure_derive;

pub mod doms;
pub mod dump;
pub mod edges;
pub mod ir;
pub mod passes;
pub mod pattern;
pub mod settings;
pub mod verifier;
pub mod walk;

mod fx;
mod opt;

pub use crate::ir::{Graph, Program};
pub use crate::opt::{
    calc_inline_benefice, can_inline, dead_node_elimination, inline_functions, inline_method,
    local_optimize_graph, optimize_cf, optimize_in_place, optimize_node,
};
pub use crate::verifier::{verify_graph, verify_graph_mode, verify_ssa};

pub use kestrel_entity as entity;
pub use kestrel_entity::packed_option;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
