//! Fast hash maps for the internal tables.
//!
//! The identity table hashes small fixed-size keys (opcodes, modes, node
//! indices) millions of times per compilation; SipHash's DoS resistance
//! buys nothing there.

pub use rustc_hash::{FxHashMap, FxHashSet};
