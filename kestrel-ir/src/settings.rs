//! Shared optimizer settings.
//!
//! The flags steer what the construction-time optimizer and the passes are
//! allowed to do. A `Program` owns one set; each `Graph` takes a copy at
//! creation so node constructors can consult it without a back pointer.

use core::fmt;

/// When and how hard graphs are verified.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VerifyMode {
    /// Never verify.
    Off,
    /// Collect structured errors and report them to the caller.
    Report,
    /// Panic on the first violation.
    On,
    /// Like `Report`, but only log errors, don't return them.
    ErrorsOnly,
}

impl Default for VerifyMode {
    fn default() -> Self {
        VerifyMode::Report
    }
}

/// Optimizer flag settings.
#[derive(Copy, Clone, Debug)]
pub struct Flags {
    /// Master switch: when off, node constructors build exactly what they
    /// are told and all rewriting entry points are no-ops.
    pub optimize: bool,
    /// Common subexpression elimination through the identity table.
    pub cse: bool,
    /// CSE ignores the block of floating nodes.
    pub global_cse: bool,
    /// Evaluate operations on constant operands at construction time.
    pub constant_folding: bool,
    /// Remove blocks not reachable from Start.
    pub unreachable_code: bool,
    /// Compact node arenas, dropping dead nodes and Id chains.
    pub dead_node_elim: bool,
    /// Allow the inliner to run.
    pub inline: bool,
    /// Create Sync nodes when memory edges are split.
    pub auto_create_sync: bool,
    /// Fuse multi-entry empty blocks into their successor ("fan merging").
    /// Off by default; see the control flow optimizer.
    pub fuse_empty_blocks: bool,
    /// Verification behavior after passes.
    pub verify: VerifyMode,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            optimize: true,
            cse: true,
            global_cse: false,
            constant_folding: true,
            unreachable_code: true,
            dead_node_elim: true,
            inline: true,
            auto_create_sync: false,
            fuse_empty_blocks: false,
            verify: VerifyMode::default(),
        }
    }
}

impl Flags {
    /// All optimizations off, for debugging and for building graphs that
    /// stay exactly as constructed.
    pub fn none() -> Self {
        Self {
            optimize: false,
            cse: false,
            global_cse: false,
            constant_folding: false,
            unreachable_code: false,
            dead_node_elim: false,
            inline: false,
            auto_create_sync: false,
            fuse_empty_blocks: false,
            verify: VerifyMode::default(),
        }
    }
}

impl fmt::Display for Flags {
    /// A verbose mirror of every flag, one per line, for reporting.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "optimize = {}", self.optimize)?;
        writeln!(f, "cse = {}", self.cse)?;
        writeln!(f, "global_cse = {}", self.global_cse)?;
        writeln!(f, "constant_folding = {}", self.constant_folding)?;
        writeln!(f, "unreachable_code = {}", self.unreachable_code)?;
        writeln!(f, "dead_node_elim = {}", self.dead_node_elim)?;
        writeln!(f, "inline = {}", self.inline)?;
        writeln!(f, "auto_create_sync = {}", self.auto_create_sync)?;
        writeln!(f, "fuse_empty_blocks = {}", self.fuse_empty_blocks)?;
        writeln!(f, "verify = {:?}", self.verify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let flags = Flags::default();
        assert!(flags.optimize);
        assert!(flags.cse);
        assert!(!flags.global_cse);
        assert!(!flags.fuse_empty_blocks);
    }

    #[test]
    fn verbose_mirror() {
        let text = Flags::default().to_string();
        assert!(text.contains("cse = true"));
        assert!(text.contains("fuse_empty_blocks = false"));
    }
}
