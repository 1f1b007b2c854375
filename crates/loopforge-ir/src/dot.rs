//! DOT (Graphviz) export of a control-flow graph, for debugging the
//! loop transforms.

use crate::{Graph, Instruction};
use std::fmt::Write;

/// Escape special characters for DOT format strings.
pub fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

fn format_instruction(instr: &Instruction) -> String {
    let mut line = format!("{}: {}", instr.id, instr.kind);
    if !instr.inputs.is_empty() {
        let inputs: Vec<String> = instr.inputs.iter().map(|i| i.to_string()).collect();
        write!(line, "({})", inputs.join(", ")).ok();
    }
    if instr.has_environment() {
        line.push_str(" [env]");
    }
    line
}

/// Renders the graph in DOT format. Each block is one node labelled
/// with its phis and instructions; loop headers are marked.
pub fn graph_to_dot(graph: &Graph, name: &str) -> String {
    let mut out = format!(
        "digraph \"{}\" {{\n    rankdir=TB;\n    node [shape=box, fontname=\"Courier\", fontsize=10];\n",
        escape_dot_string(name)
    );
    for block in graph.block_ids() {
        let data = graph.block(block).expect("block exists");
        let mut label = format!("{block}");
        if graph.is_loop_header(block) {
            label.push_str(" (header)");
        }
        label.push_str(":\\l");
        for &id in data.phis.iter().chain(data.instructions.iter()) {
            if let Some(instr) = graph.instruction(id) {
                label.push_str(&escape_dot_string(&format_instruction(instr)));
                label.push_str("\\l");
            }
        }
        writeln!(out, "    \"{block}\" [label=\"{label}\"];").ok();
    }
    for block in graph.block_ids() {
        for &succ in graph.successors(block) {
            writeln!(out, "    \"{block}\" -> \"{succ}\";").ok();
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstructionKind, IrType};

    // --- escape_dot_string Tests ---

    #[test]
    fn test_escape_dot_string() {
        assert_eq!(escape_dot_string("hello"), "hello");
        assert_eq!(escape_dot_string("a\"b"), "a\\\"b");
        assert_eq!(escape_dot_string("a<b>c"), "a\\<b\\>c");
    }

    // --- graph_to_dot Tests ---

    #[test]
    fn test_graph_to_dot_contains_blocks_and_edges() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let exit = g.add_block();
        g.add_edge(entry, exit);
        g.append_instruction(entry, InstructionKind::Goto, IrType::Void, vec![]);
        g.append_instruction(exit, InstructionKind::Return, IrType::Void, vec![]);

        let dot = graph_to_dot(&g, "test");
        assert!(dot.starts_with("digraph \"test\""));
        assert!(dot.contains("\"bb0\""));
        assert!(dot.contains("\"bb1\""));
        assert!(dot.contains("\"bb0\" -> \"bb1\";"));
        assert!(dot.contains("goto"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_graph_to_dot_marks_loop_headers() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let header = g.add_block();
        let body = g.add_block();
        let exit = g.add_block();
        g.add_edge(entry, header);
        g.add_edge(header, exit);
        g.add_edge(header, body);
        g.add_edge(body, header);
        g.build_dominator_tree();

        let dot = graph_to_dot(&g, "loop");
        assert!(dot.contains("bb1 (header)"));
    }
}
