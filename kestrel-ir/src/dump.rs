//! VCG dumping.
//!
//! Writes a graph in the VCG format, one box per node, blocks as nested
//! subgraphs, annotated with the node count in the title line. Intended
//! for eyeballing graphs in a VCG viewer while debugging passes.

use crate::fx::FxHashMap;
use crate::ir::node::NodeAttr;
use crate::ir::opcode::Opcode;
use crate::ir::{Graph, Node};
use std::io::{Result, Write};
use std::vec::Vec;

fn node_label(graph: &Graph, n: Node) -> String {
    match graph.attr(n) {
        NodeAttr::Const(tv) => format!("Const {}", tv),
        NodeAttr::Proj(num) => format!("Proj {} {}", num, graph.mode(n)),
        NodeAttr::Cmp(rel) => format!("Cmp {:?}", rel),
        _ => format!("{} {}", graph.opcode(n).name(), graph.mode(n)),
    }
}

/// Write `graph` as a VCG file.
pub fn write_vcg<W: Write>(w: &mut W, graph: &Graph, name: &str) -> Result<()> {
    let mut live = 0usize;
    let mut per_block: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
    let mut blockless: Vec<Node> = Vec::new();
    for n in graph.nodes() {
        match graph.opcode(n) {
            Opcode::Id => continue,
            Opcode::Block => {
                live += 1;
                per_block.entry(n).or_default();
            }
            _ => {
                live += 1;
                match graph.block(n) {
                    Some(b) => per_block.entry(b).or_default().push(n),
                    None => blockless.push(n),
                }
            }
        }
    }

    writeln!(w, "graph: {{ title: \"{}\"", name)?;
    writeln!(w, "label: \"{} ({} nodes)\"", name, live)?;
    writeln!(w, "layoutalgorithm: mindepth")?;
    writeln!(w, "orientation: bottom_to_top")?;

    let mut blocks: Vec<Node> = per_block.keys().cloned().collect();
    blocks.sort();
    for block in blocks {
        writeln!(w, "graph: {{ title: \"{}\" label: \"{}\"", block, block)?;
        for &n in &per_block[&block] {
            writeln!(
                w,
                "node: {{ title: \"{}\" label: \"{}\" }}",
                n,
                node_label(graph, n)
            )?;
        }
        writeln!(w, "}}")?;
    }
    for &n in &blockless {
        writeln!(
            w,
            "node: {{ title: \"{}\" label: \"{}\" }}",
            n,
            node_label(graph, n)
        )?;
    }

    for n in graph.nodes() {
        if graph.opcode(n) == Opcode::Id {
            continue;
        }
        for i in 0..graph.arity(n) {
            let tgt = graph.get_in(n, i);
            writeln!(
                w,
                "edge: {{ sourcename: \"{}\" targetname: \"{}\" label: \"{}\" }}",
                n, tgt, i
            )?;
        }
    }
    writeln!(w, "}}")
}
