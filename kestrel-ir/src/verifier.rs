//! Graph verifier.
//!
//! A post-condition predicate runnable after any pass: checks operand
//! arities, the per-opcode mode typing rules, Phi/block arity agreement and
//! the shape of block predecessors. Verification never mutates the graph,
//! so running it twice yields identical results.

use crate::ir::entities::AnyEntity;
use crate::ir::graph::Phase;
use crate::ir::modes::{self, Mode};
use crate::ir::node::NodeAttr;
use crate::ir::opcode::{pn, Arity, Opcode};
use crate::ir::types::TypeStore;
use crate::ir::{Graph, Node};
use crate::settings::VerifyMode;
use core::fmt;
use std::string::String;
use std::vec::Vec;

/// A verifier error.
#[derive(Fail, Debug, PartialEq, Eq, Clone)]
#[fail(display = "{}: {}", location, message)]
pub struct VerifierError {
    /// Where the error occurred.
    pub location: AnyEntity,
    /// What went wrong.
    pub message: String,
}

/// A list of verifier errors.
#[derive(Fail, Debug, Default, PartialEq, Eq, Clone)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl VerifierErrors {
    /// Return `Ok` if no errors were collected.
    pub fn as_result(self) -> VerifierResult {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for VerifierErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for err in &self.0 {
            writeln!(f, "- {}", err)?;
        }
        write!(
            f,
            "{} verifier error{} detected",
            self.0.len(),
            if self.0.len() == 1 { "" } else { "s" }
        )
    }
}

/// Result type of graph verification.
pub type VerifierResult = Result<(), VerifierErrors>;

struct Verifier<'a> {
    graph: &'a Graph,
    types: &'a TypeStore,
    errors: VerifierErrors,
}

impl<'a> Verifier<'a> {
    fn report(&mut self, n: Node, message: String) {
        self.errors.0.push(VerifierError {
            location: n.into(),
            message,
        });
    }

    fn check_arity(&mut self, n: Node) {
        let opcode = self.graph.opcode(n);
        if let Arity::Fixed(want) = opcode.arity() {
            let have = self.graph.arity(n);
            if have != want {
                self.report(
                    n,
                    format!("{} has arity {}, expected {}", opcode.name(), have, want),
                );
            }
        }
    }

    fn in_mode(&self, n: Node, i: usize) -> Mode {
        self.graph.mode(self.graph.get_in(n, i))
    }

    fn want_in(&mut self, n: Node, i: usize, want: Mode) {
        if self.graph.arity(n) <= i {
            return;
        }
        let have = self.in_mode(n, i);
        // Bad and Unknown slots satisfy any rule.
        if have == want || have == modes::BAD || have == modes::ANY {
            return;
        }
        let opcode = self.graph.opcode(n);
        self.report(
            n,
            format!(
                "{} operand {} has mode {}, expected {}",
                opcode.name(),
                i,
                have,
                want
            ),
        );
    }

    fn want_mode(&mut self, n: Node, want: Mode) {
        let have = self.graph.mode(n);
        if have != want {
            self.report(
                n,
                format!(
                    "{} has mode {}, expected {}",
                    self.graph.opcode(n).name(),
                    have,
                    want
                ),
            );
        }
    }

    fn want_data_in(&mut self, n: Node, i: usize) {
        if self.graph.arity(n) <= i {
            return;
        }
        let have = self.in_mode(n, i);
        if !have.is_data() && have != modes::BAD && have != modes::ANY {
            self.report(
                n,
                format!(
                    "{} operand {} has non-data mode {}",
                    self.graph.opcode(n).name(),
                    i,
                    have
                ),
            );
        }
    }

    /// Binary arithmetic rule: operands of the node's own mode, with the
    /// reference +/- integer exception.
    fn check_binop_modes(&mut self, n: Node) {
        let mode = self.graph.mode(n);
        let opcode = self.graph.opcode(n);
        if mode.is_reference() && (opcode == Opcode::Add || opcode == Opcode::Sub) {
            // P +/- int offset.
            self.want_in(n, 0, modes::P);
            let off = self.in_mode(n, 1);
            if !off.is_int() && off != modes::BAD {
                self.report(n, format!("reference offset has mode {}", off));
            }
            return;
        }
        self.want_in(n, 0, mode);
        self.want_in(n, 1, mode);
    }

    fn check_node(&mut self, n: Node) {
        let graph = self.graph;
        let opcode = graph.opcode(n);
        let mode = graph.mode(n);
        self.check_arity(n);
        match opcode {
            Opcode::Block => {
                self.want_mode(n, modes::BB);
                for i in 0..graph.arity(n) {
                    let have = self.in_mode(n, i);
                    if have != modes::X && have != modes::BAD {
                        self.report(n, format!("block pred {} has mode {}", i, have));
                    }
                }
            }
            Opcode::Start => self.want_mode(n, modes::T),
            Opcode::End => {
                self.want_mode(n, modes::X);
                // End block preds are Return, Raise, fragile X projections
                // or Bad; checked on the end block itself below.
            }
            Opcode::Jmp => self.want_mode(n, modes::X),
            Opcode::Cond => {
                self.want_mode(n, modes::T);
                self.want_in(n, 0, modes::B);
            }
            Opcode::Switch => {
                self.want_mode(n, modes::T);
                let have = self.in_mode(n, 0);
                if !have.is_int() && have != modes::BAD {
                    self.report(n, format!("switch selector has mode {}", have));
                }
            }
            Opcode::Return => {
                self.want_mode(n, modes::X);
                self.want_in(n, 0, modes::M);
                for i in 1..graph.arity(n) {
                    self.want_data_in(n, i);
                }
            }
            Opcode::Raise => {
                self.want_mode(n, modes::X);
                self.want_in(n, 0, modes::M);
                self.want_in(n, 1, modes::P);
            }
            Opcode::Const => {
                match *graph.attr(n) {
                    NodeAttr::Const(tv) => {
                        if tv.mode() != mode {
                            self.report(
                                n,
                                format!("Const mode {} differs from tarval {}", mode, tv),
                            );
                        }
                    }
                    _ => self.report(n, String::from("Const without tarval attribute")),
                }
                if !mode.is_data() {
                    self.report(n, format!("Const of non-data mode {}", mode));
                }
            }
            Opcode::SymConst => {
                if !mode.is_data() {
                    self.report(n, format!("SymConst of non-data mode {}", mode));
                }
            }
            Opcode::Sel => {
                self.want_mode(n, modes::P);
                self.want_in(n, 0, modes::P);
            }
            Opcode::Call => {
                self.want_mode(n, modes::T);
                self.want_in(n, 0, modes::M);
                self.want_in(n, 1, modes::P);
                if let NodeAttr::Call(ty) = *graph.attr(n) {
                    let want = self.types.n_params(ty);
                    let have = graph.arity(n).saturating_sub(2);
                    if want != have {
                        self.report(
                            n,
                            format!("Call passes {} arguments, type has {}", have, want),
                        );
                    }
                }
            }
            Opcode::CopyB => {
                self.want_mode(n, modes::M);
                self.want_in(n, 0, modes::M);
                self.want_in(n, 1, modes::P);
                self.want_in(n, 2, modes::P);
            }
            Opcode::Load => {
                self.want_mode(n, modes::T);
                self.want_in(n, 0, modes::M);
                self.want_in(n, 1, modes::P);
            }
            Opcode::Store => {
                self.want_mode(n, modes::T);
                self.want_in(n, 0, modes::M);
                self.want_in(n, 1, modes::P);
                self.want_data_in(n, 2);
            }
            Opcode::Sync => {
                self.want_mode(n, modes::M);
                for i in 0..graph.arity(n) {
                    self.want_in(n, i, modes::M);
                }
            }
            Opcode::Alloc => {
                self.want_mode(n, modes::T);
                self.want_in(n, 0, modes::M);
                let count = self.in_mode(n, 1);
                if !count.is_int() && count != modes::BAD {
                    self.report(n, format!("Alloc count has mode {}", count));
                }
            }
            Opcode::Free => {
                self.want_mode(n, modes::M);
                self.want_in(n, 0, modes::M);
                self.want_in(n, 1, modes::P);
            }
            Opcode::NoMem => self.want_mode(n, modes::M),
            Opcode::Phi => {
                for i in 0..graph.arity(n) {
                    self.want_in(n, i, mode);
                }
                if let Some(block) = graph.block(n) {
                    if graph.phase != Phase::Building
                        && graph.is_matured(block)
                        && graph.arity(n) != graph.arity(block)
                    {
                        self.report(
                            n,
                            format!(
                                "Phi arity {} != block arity {}",
                                graph.arity(n),
                                graph.arity(block)
                            ),
                        );
                    }
                }
            }
            Opcode::Proj => {
                let pred = graph.get_in(n, 0);
                let pred_mode = graph.mode(pred);
                if pred_mode != modes::T && pred_mode != modes::BAD {
                    self.report(n, format!("Proj of non-tuple mode {}", pred_mode));
                }
                self.check_proj_table(n, pred);
            }
            Opcode::Tuple => self.want_mode(n, modes::T),
            Opcode::Id => {}
            Opcode::Confirm => {
                self.want_in(n, 0, mode);
                self.want_in(n, 1, mode);
            }
            Opcode::Mux => {
                self.want_in(n, 0, modes::B);
                self.want_in(n, 1, mode);
                self.want_in(n, 2, mode);
            }
            Opcode::Add | Opcode::Sub => self.check_binop_modes(n),
            Opcode::Mul | Opcode::Mulh | Opcode::And | Opcode::Or | Opcode::Eor => {
                self.check_binop_modes(n)
            }
            Opcode::Div | Opcode::Mod => {
                self.want_mode(n, modes::T);
                self.want_in(n, 0, modes::M);
                if let NodeAttr::DivMod { res_mode } = *graph.attr(n) {
                    self.want_in(n, 1, res_mode);
                    self.want_in(n, 2, res_mode);
                }
            }
            Opcode::Minus | Opcode::Abs | Opcode::Not => self.want_in(n, 0, mode),
            Opcode::Shl | Opcode::Shr | Opcode::Shrs | Opcode::Rotl => {
                self.want_in(n, 0, mode);
                let amount = self.in_mode(n, 1);
                if !amount.is_int() && amount != modes::BAD {
                    self.report(n, format!("shift amount has mode {}", amount));
                }
            }
            Opcode::Cmp => {
                self.want_mode(n, modes::B);
                let l = self.in_mode(n, 0);
                let r = self.in_mode(n, 1);
                if l != r && l != modes::BAD && r != modes::BAD {
                    self.report(n, format!("Cmp operand modes {} and {} differ", l, r));
                }
            }
            Opcode::Conv => {
                self.want_data_in(n, 0);
                if !mode.is_data() {
                    self.report(n, format!("Conv to non-data mode {}", mode));
                }
            }
            Opcode::Bad | Opcode::Unknown | Opcode::Anchor => {}
            Opcode::Dialect(_) => {}
        }
    }

    /// Check the stable projection-number table for the known tuples.
    fn check_proj_table(&mut self, n: Node, pred: Node) {
        let num = match *self.graph.attr(n) {
            NodeAttr::Proj(num) => num,
            _ => {
                self.report(n, String::from("Proj without number"));
                return;
            }
        };
        let mode = self.graph.mode(n);
        let want = match self.graph.opcode(pred) {
            Opcode::Start => match num {
                pn::start::X_INITIAL_EXEC => Some(modes::X),
                pn::start::M => Some(modes::M),
                pn::start::P_FRAME_BASE => Some(modes::P),
                pn::start::T_ARGS => Some(modes::T),
                _ => {
                    self.report(n, format!("Proj(Start) with number {}", num));
                    None
                }
            },
            Opcode::Call => match num {
                pn::call::M => Some(modes::M),
                pn::call::X_REGULAR | pn::call::X_EXCEPT => Some(modes::X),
                pn::call::T_RESULT => Some(modes::T),
                _ => {
                    self.report(n, format!("Proj(Call) with number {}", num));
                    None
                }
            },
            Opcode::Load => match num {
                pn::load::M => Some(modes::M),
                pn::load::X_EXCEPT => Some(modes::X),
                pn::load::RES => match *self.graph.attr(pred) {
                    NodeAttr::Load { mode, .. } => Some(mode),
                    _ => None,
                },
                _ => {
                    self.report(n, format!("Proj(Load) with number {}", num));
                    None
                }
            },
            Opcode::Store => match num {
                pn::store::M => Some(modes::M),
                pn::store::X_EXCEPT => Some(modes::X),
                _ => {
                    self.report(n, format!("Proj(Store) with number {}", num));
                    None
                }
            },
            Opcode::Div | Opcode::Mod => match num {
                pn::div::M => Some(modes::M),
                pn::div::X_EXCEPT => Some(modes::X),
                pn::div::RES => match *self.graph.attr(pred) {
                    NodeAttr::DivMod { res_mode } => Some(res_mode),
                    _ => None,
                },
                _ => {
                    self.report(n, format!("Proj(Div) with number {}", num));
                    None
                }
            },
            Opcode::Cond => match num {
                pn::cond::FALSE | pn::cond::TRUE => Some(modes::X),
                _ => {
                    self.report(n, format!("Proj(Cond) with number {}", num));
                    None
                }
            },
            Opcode::Switch => Some(modes::X),
            _ => None,
        };
        if let Some(want) = want {
            if mode != want && mode != modes::BAD {
                self.report(
                    n,
                    format!("Proj {} of {} has mode {}, expected {}", num, pred, mode, want),
                );
            }
        }
    }

    fn check_end_block(&mut self) {
        let graph = self.graph;
        let end_block = graph.end_block();
        for i in 0..graph.arity(end_block) {
            let pred = graph.get_in(end_block, i);
            let ok = match graph.opcode(pred) {
                Opcode::Return | Opcode::Raise | Opcode::Bad => true,
                // Fragile ops reach the end block through X projections.
                Opcode::Proj => graph.mode(pred) == modes::X,
                _ => false,
            };
            if !ok {
                self.report(
                    end_block,
                    format!(
                        "end block pred {} is a {}",
                        i,
                        graph.opcode(pred).name()
                    ),
                );
            }
        }
    }
}

/// Verify `graph` in report mode: collect all violations.
pub fn verify_graph(graph: &Graph, types: &TypeStore) -> VerifierResult {
    let mut verifier = Verifier {
        graph,
        types,
        errors: VerifierErrors::default(),
    };
    for n in graph.nodes() {
        if graph.opcode(n) == Opcode::Id {
            continue;
        }
        verifier.check_node(n);
    }
    verifier.check_end_block();
    verifier.errors.as_result()
}

/// Verify the SSA dominance invariant: every use of a value by a non-Phi
/// node lies in a block dominated by the value's defining block, and every
/// i-th Phi input lies in a block dominated by the i-th predecessor of the
/// Phi's block. Needs a freshly computed dominator tree.
pub fn verify_ssa(graph: &Graph, doms: &crate::doms::DominatorTree) -> VerifierResult {
    let mut errors = VerifierErrors::default();
    for n in graph.nodes() {
        let opcode = graph.opcode(n);
        match opcode {
            Opcode::Id | Opcode::Block | Opcode::Anchor | Opcode::End => continue,
            _ => {}
        }
        let block = match graph.block(n) {
            Some(b) => b,
            None => continue,
        };
        if !doms.is_reachable(block) {
            continue;
        }
        let is_phi = opcode == Opcode::Phi;
        for i in 0..graph.arity(n) {
            let op = graph.get_in(n, i);
            if graph.is_bad(op) || graph.opcode(op) == Opcode::Unknown {
                continue;
            }
            let def_block = match graph.block(op) {
                Some(b) => b,
                None => continue,
            };
            let use_block = if is_phi {
                let pred = graph.get_in(block, i);
                if graph.is_bad(pred) {
                    continue;
                }
                match graph.block(pred) {
                    Some(b) => b,
                    None => continue,
                }
            } else {
                block
            };
            if !doms.is_reachable(use_block) {
                continue;
            }
            if !doms.dominates(def_block, use_block) {
                errors.0.push(VerifierError {
                    location: n.into(),
                    message: format!(
                        "operand {} defined in {} does not dominate its use in {}",
                        op, def_block, use_block
                    ),
                });
            }
        }
    }
    errors.as_result()
}

/// Verify `graph` according to `mode`.
///
/// `On` panics on violations, `Report` returns them, `ErrorsOnly` logs
/// them, `Off` does nothing.
pub fn verify_graph_mode(graph: &Graph, types: &TypeStore, mode: VerifyMode) -> VerifierResult {
    match mode {
        VerifyMode::Off => Ok(()),
        VerifyMode::Report => verify_graph(graph, types),
        VerifyMode::On => {
            if let Err(errors) = verify_graph(graph, types) {
                panic!("graph verification failed:\n{}", errors);
            }
            Ok(())
        }
        VerifyMode::ErrorsOnly => {
            if let Err(errors) = verify_graph(graph, types) {
                log::error!("{}", errors);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{CompoundKind, TypeStore};
    use crate::ir::Tarval;
    use crate::settings::Flags;

    fn graph_and_types() -> (Graph, TypeStore) {
        let mut store = TypeStore::new();
        let frame = store.new_compound(CompoundKind::Struct, "frame");
        (Graph::new(Flags::none(), frame), store)
    }

    fn finish(g: &mut Graph) {
        let b = g.new_block(&[g.initial_exec()]);
        let mem = g.initial_mem();
        let ret = g.new_return(b, mem, &[]);
        let end_block = g.end_block();
        g.add_block_pred(end_block, ret);
        g.mature_block(end_block);
        g.phase = Phase::High;
    }

    #[test]
    fn fresh_graph_verifies() {
        let (mut g, types) = graph_and_types();
        finish(&mut g);
        assert!(verify_graph(&g, &types).is_ok());
    }

    #[test]
    fn verifier_is_idempotent() {
        let (mut g, types) = graph_and_types();
        finish(&mut g);
        let first = verify_graph(&g, &types);
        let second = verify_graph(&g, &types);
        assert_eq!(first, second);
    }

    #[test]
    fn detects_mode_mismatch() {
        let (mut g, types) = graph_and_types();
        let block = g.start_block();
        let c32 = g.new_const(Tarval::new_int(modes::IS32, 1));
        let c64 = g.new_const(Tarval::new_int(modes::IS64, 1));
        // An Is32 Add with an Is64 operand violates the typing rule.
        let _bad = g.new_add(block, c32, c64, modes::IS32);
        finish(&mut g);
        let result = verify_graph(&g, &types);
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.0.iter().any(|e| e.message.contains("operand")));
    }

    #[test]
    fn detects_phi_arity_mismatch() {
        let (mut g, types) = graph_and_types();
        let b = g.new_block(&[g.initial_exec()]);
        let c = g.new_const(Tarval::new_int(modes::IS32, 1));
        // Phi with two inputs in a one-pred block.
        let phi = g.new_phi0(b, modes::IS32);
        g.set_ins(phi, &[c, c]);
        g.keep_alive(phi);
        finish(&mut g);
        let result = verify_graph(&g, &types);
        assert!(result.is_err());
    }

    #[test]
    fn detects_bad_end_block_pred() {
        let (mut g, types) = graph_and_types();
        let b = g.new_block(&[g.initial_exec()]);
        let jmp = g.new_jmp(b);
        let end_block = g.end_block();
        g.add_block_pred(end_block, jmp);
        g.mature_block(end_block);
        g.phase = Phase::High;
        let result = verify_graph(&g, &types);
        assert!(result.is_err());
    }

    #[test]
    fn ssa_dominance() {
        let (mut g, types) = graph_and_types();
        let b0 = g.new_block(&[g.initial_exec()]);
        let mem = g.initial_mem();
        let ptr = g.frame();
        let load = g.new_load(b0, mem, ptr, modes::B);
        let sel = g.new_proj(load, modes::B, crate::ir::opcode::pn::load::RES);
        let cond = g.new_cond(b0, sel);
        let proj_t = g.new_proj(cond, modes::X, crate::ir::opcode::pn::cond::TRUE);
        let proj_f = g.new_proj(cond, modes::X, crate::ir::opcode::pn::cond::FALSE);
        let bt = g.new_block(&[proj_t]);
        let bf = g.new_block(&[proj_f]);
        // A value defined in the true branch...
        let load_t = g.new_load(bt, mem, ptr, modes::IS32);
        let vt = g.new_proj(load_t, modes::IS32, crate::ir::opcode::pn::load::RES);
        let jt = g.new_jmp(bt);
        let jf = g.new_jmp(bf);
        let join = g.new_block(&[jt, jf]);
        let c = g.new_const(Tarval::new_int(modes::IS32, 1));
        let phi = g.new_phi(join, &[vt, c], modes::IS32);
        finish(&mut g);
        g.keep_alive(g.skip_id(phi));

        let doms = crate::doms::DominatorTree::compute(&g);
        // The Phi use is fine: vt flows along the bt edge.
        assert!(verify_ssa(&g, &doms).is_ok());

        // ...used directly in the false branch breaks dominance.
        let bad_use = g.new_minus(bf, vt, modes::IS32);
        g.keep_alive(bad_use);
        let doms = crate::doms::DominatorTree::compute(&g);
        let result = verify_ssa(&g, &doms);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .0
            .iter()
            .any(|e| e.message.contains("dominate")));
    }

    #[test]
    fn strict_mode_panics() {
        let (mut g, types) = graph_and_types();
        let block = g.start_block();
        let c32 = g.new_const(Tarval::new_int(modes::IS32, 1));
        let c64 = g.new_const(Tarval::new_int(modes::IS64, 1));
        let _bad = g.new_add(block, c32, c64, modes::IS32);
        finish(&mut g);
        let result = std::panic::catch_unwind(move || {
            let _ = verify_graph_mode(&g, &types, VerifyMode::On);
        });
        assert!(result.is_err());
    }
}
