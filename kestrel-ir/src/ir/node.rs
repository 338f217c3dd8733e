//! Node payloads.
//!
//! Every node consists of the fields shared by all opcodes (opcode, mode,
//! owning block, input list) plus an opcode-specific attribute payload. The
//! payload enum derives `Eq`/`Hash` because it is part of the identity key
//! the value-numbering table uses.

use crate::ir::entities::{Entity, Node, TypeRef};
use crate::ir::modes::Mode;
use crate::ir::opcode::Opcode;
use crate::ir::tarval::{Relation, Tarval};
use crate::ir::types::Volatility;
use kestrel_entity::packed_option::PackedOption;
use smallvec::SmallVec;
use std::vec::Vec;

/// What a symbolic constant stands for.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SymConstKind {
    /// The address of an entity.
    Address(Entity),
    /// The size of a type in bytes.
    TypeSize(TypeRef),
    /// The alignment of a type in bytes.
    TypeAlign(TypeRef),
}

/// Where an `Alloc` takes its memory from.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AllocKind {
    /// The procedure's stack frame.
    Stack,
    /// The heap.
    Heap,
}

/// One case range of a `Switch` table.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SwitchEntry {
    /// Smallest selector value of the range.
    pub min: Tarval,
    /// Largest selector value of the range, inclusive.
    pub max: Tarval,
    /// The projection number taken for selectors in the range.
    pub pn: u32,
}

/// The case table of a `Switch`. Projection number 0 is the default.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SwitchTable {
    /// The case ranges. Ranges must not overlap.
    pub entries: Vec<SwitchEntry>,
    /// Number of distinct projection numbers, default included.
    pub n_outs: u32,
}

impl SwitchTable {
    /// The projection selected by a concrete selector value, the default
    /// projection when no range matches.
    pub fn lookup(&self, selector: Tarval) -> u32 {
        use crate::ir::opcode::pn;
        for entry in &self.entries {
            let ge_min = entry
                .min
                .compare(selector)
                .intersects(Relation::LESS | Relation::EQUAL);
            let le_max = selector
                .compare(entry.max)
                .intersects(Relation::LESS | Relation::EQUAL);
            if ge_min && le_max {
                return entry.pn;
            }
        }
        pn::switch::DEFAULT
    }
}

/// Per-block bookkeeping.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BlockAttr {
    /// A matured block's predecessor count is final.
    pub matured: bool,
}

/// The opcode-specific payload of a node.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeAttr {
    /// No payload.
    None,
    /// `Block` bookkeeping.
    Block(BlockAttr),
    /// The value of a `Const`.
    Const(Tarval),
    /// The meaning of a `SymConst`.
    SymConst(SymConstKind),
    /// The selected entity of a `Sel`.
    Sel(Entity),
    /// The method type of a `Call`.
    Call(TypeRef),
    /// Result mode and volatility of a `Load`.
    Load {
        /// The mode of the loaded value.
        mode: Mode,
        /// Whether the access is volatile.
        volatility: Volatility,
    },
    /// Volatility of a `Store`.
    Store {
        /// Whether the access is volatile.
        volatility: Volatility,
    },
    /// Result mode of a `Div` or `Mod`.
    DivMod {
        /// The mode of the quotient or remainder.
        res_mode: Mode,
    },
    /// Allocated type and placement of an `Alloc`.
    Alloc {
        /// The type being allocated.
        ty: TypeRef,
        /// Stack or heap.
        kind: AllocKind,
    },
    /// The freed type of a `Free`.
    Free(TypeRef),
    /// The copied compound type of a `CopyB`.
    CopyB(TypeRef),
    /// The relation of a `Cmp`.
    Cmp(Relation),
    /// The asserted relation of a `Confirm`.
    Confirm(Relation),
    /// The case table of a `Switch`.
    Switch(SwitchTable),
    /// The selected component of a `Proj`.
    Proj(u32),
}

/// The data of one node.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub(crate) opcode: Opcode,
    pub(crate) mode: Mode,
    pub(crate) block: PackedOption<Node>,
    pub(crate) ins: SmallVec<[Node; 4]>,
    pub(crate) attr: NodeAttr,
}

impl NodeData {
    pub(crate) fn new(
        opcode: Opcode,
        mode: Mode,
        block: PackedOption<Node>,
        ins: &[Node],
        attr: NodeAttr,
    ) -> Self {
        Self {
            opcode,
            mode,
            block,
            ins: SmallVec::from_slice(ins),
            attr,
        }
    }

    /// The opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The mode of the node's value.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The attribute payload.
    pub fn attr(&self) -> &NodeAttr {
        &self.attr
    }

    /// The inputs. For a `Block` these are the control flow predecessors.
    pub fn ins(&self) -> &[Node] {
        &self.ins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::modes;
    use crate::ir::opcode::pn;

    #[test]
    fn switch_lookup() {
        let table = SwitchTable {
            entries: vec![
                SwitchEntry {
                    min: Tarval::new_int(modes::IS32, 1),
                    max: Tarval::new_int(modes::IS32, 3),
                    pn: 1,
                },
                SwitchEntry {
                    min: Tarval::new_int(modes::IS32, 10),
                    max: Tarval::new_int(modes::IS32, 10),
                    pn: 2,
                },
            ],
            n_outs: 3,
        };
        assert_eq!(table.lookup(Tarval::new_int(modes::IS32, 2)), 1);
        assert_eq!(table.lookup(Tarval::new_int(modes::IS32, 10)), 2);
        assert_eq!(
            table.lookup(Tarval::new_int(modes::IS32, 4)),
            pn::switch::DEFAULT
        );
    }
}
