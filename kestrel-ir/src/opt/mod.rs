//! The optimizers: construction-time local optimization, control flow
//! optimization, dead node elimination and the inliner.

pub mod cfopt;
pub mod dce;
pub mod inline;
pub mod local;

pub use self::cfopt::optimize_cf;
pub use self::dce::dead_node_elimination;
pub use self::inline::{calc_inline_benefice, can_inline, inline_functions, inline_method};
pub use self::local::{local_optimize_graph, optimize_in_place, optimize_node};
