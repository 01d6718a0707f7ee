//! Newick reader and writer.
//!
//! Supported syntax:
//! - nested `( , )` groups with optional internal labels
//! - `:length` on any node (required on every non-root node)
//! - single-quoted labels, with `''` as an escaped quote
//! - `[...]` comments anywhere between tokens
//!
//! Unquoted underscores are kept as-is rather than read as spaces, because
//! tip labels are matched against underscore-joined binomials.

use std::path::Path;

use tracing::debug;

use crate::error::{PhyloError, PhyloResult};
use crate::tree::{Node, NodeId, PhyloTree};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Colon,
    Semicolon,
    Text(String),
}

struct Lexer<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            text,
            pos: 0,
        }
    }

    fn skip_blank(&mut self) -> PhyloResult<()> {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'[' => {
                    let start = self.pos;
                    match self.text[self.pos..].find(']') {
                        Some(offset) => self.pos += offset + 1,
                        None => return Err(PhyloError::syntax(start, "unterminated comment")),
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Next token and its starting byte offset.
    fn next_token(&mut self) -> PhyloResult<Option<(usize, Token)>> {
        self.skip_blank()?;
        let start = self.pos;
        let Some(&byte) = self.bytes.get(self.pos) else {
            return Ok(None);
        };

        let token = match byte {
            b'(' => Token::Open,
            b')' => Token::Close,
            b',' => Token::Comma,
            b':' => Token::Colon,
            b';' => Token::Semicolon,
            b'\'' => return self.quoted(start).map(|t| Some((start, t))),
            _ => {
                while self.pos < self.bytes.len() && !is_delimiter(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                return Ok(Some((start, Token::Text(self.text[start..self.pos].to_string()))));
            }
        };
        self.pos += 1;
        Ok(Some((start, token)))
    }

    fn quoted(&mut self, start: usize) -> PhyloResult<Token> {
        let mut label = String::new();
        self.pos += 1;
        loop {
            let rest = &self.text[self.pos..];
            let Some(offset) = rest.find('\'') else {
                return Err(PhyloError::syntax(start, "unterminated quoted label"));
            };
            label.push_str(&rest[..offset]);
            self.pos += offset + 1;
            if self.bytes.get(self.pos) == Some(&b'\'') {
                label.push('\'');
                self.pos += 1;
            } else {
                return Ok(Token::Text(label));
            }
        }
    }
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b',' | b':' | b';' | b'[' | b'\'' | b' ' | b'\t' | b'\r' | b'\n'
    )
}

/// Parse a single Newick tree.
pub fn parse_newick(text: &str) -> PhyloResult<PhyloTree> {
    let mut lexer = Lexer::new(text);
    let mut nodes: Vec<Node> = Vec::new();
    // Open groups, innermost last
    let mut open: Vec<NodeId> = Vec::new();
    // Node that a following label or length applies to
    let mut current: Option<NodeId> = None;
    // A node may start here (after '(' or ',' or at the beginning)
    let mut expect_node = true;
    // A label may follow here (right after ')')
    let mut label_slot = false;
    let mut terminated = false;

    while let Some((pos, token)) = lexer.next_token()? {
        match token {
            Token::Open => {
                if !expect_node {
                    return Err(PhyloError::syntax(pos, "unexpected '('"));
                }
                let id = push_node(&mut nodes, open.last().copied(), None, pos)?;
                open.push(id);
                current = None;
                label_slot = false;
            }
            Token::Text(label) => {
                if expect_node {
                    let id = push_node(&mut nodes, open.last().copied(), Some(label), pos)?;
                    current = Some(id);
                    expect_node = false;
                } else if label_slot {
                    if let Some(id) = current {
                        nodes[id.0].label = Some(label);
                    }
                    label_slot = false;
                } else {
                    return Err(PhyloError::syntax(pos, format!("unexpected label '{}'", label)));
                }
            }
            Token::Colon => {
                let id = match current {
                    Some(id) if nodes[id.0].length.is_none() => id,
                    _ => return Err(PhyloError::syntax(pos, "unexpected ':'")),
                };
                let length = match lexer.next_token()? {
                    Some((num_pos, Token::Text(raw))) => raw
                        .parse::<f64>()
                        .map_err(|_| PhyloError::syntax(num_pos, format!("invalid branch length '{}'", raw)))?,
                    _ => return Err(PhyloError::syntax(pos, "expected branch length after ':'")),
                };
                nodes[id.0].length = Some(length);
                label_slot = false;
            }
            Token::Comma => {
                if expect_node {
                    return Err(PhyloError::syntax(pos, "empty node"));
                }
                if open.is_empty() {
                    return Err(PhyloError::syntax(pos, "',' outside of a group"));
                }
                expect_node = true;
                current = None;
                label_slot = false;
            }
            Token::Close => {
                if expect_node {
                    return Err(PhyloError::syntax(pos, "empty node"));
                }
                let id = open
                    .pop()
                    .ok_or_else(|| PhyloError::syntax(pos, "unbalanced ')'"))?;
                current = Some(id);
                label_slot = true;
            }
            Token::Semicolon => {
                if expect_node || !open.is_empty() {
                    return Err(PhyloError::syntax(pos, "unexpected ';'"));
                }
                terminated = true;
                break;
            }
        }
    }

    if !terminated {
        return Err(PhyloError::syntax(text.len(), "missing ';'"));
    }
    if let Some((pos, _)) = lexer.next_token()? {
        return Err(PhyloError::syntax(pos, "trailing content after ';'"));
    }

    let tree = PhyloTree::from_nodes(nodes)?;
    debug!(tips = tree.num_tips(), nodes = tree.len(), "Parsed Newick tree");
    Ok(tree)
}

fn push_node(
    nodes: &mut Vec<Node>,
    parent: Option<NodeId>,
    label: Option<String>,
    pos: usize,
) -> PhyloResult<NodeId> {
    if parent.is_none() && !nodes.is_empty() {
        return Err(PhyloError::syntax(pos, "more than one root"));
    }
    let id = NodeId(nodes.len());
    nodes.push(Node {
        label,
        length: None,
        parent,
        children: Vec::new(),
    });
    if let Some(parent) = parent {
        nodes[parent.0].children.push(id);
    }
    Ok(id)
}

/// Read and parse a Newick file.
pub fn load_newick(path: impl AsRef<Path>) -> PhyloResult<PhyloTree> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_newick(&text)
}

/// Serialize a tree to Newick text.
pub fn to_newick(tree: &PhyloTree) -> String {
    // Children have larger ids than parents, so a reverse sweep
    // finishes every subtree before its parent needs it
    let mut parts: Vec<String> = vec![String::new(); tree.len()];
    for i in (0..tree.len()).rev() {
        let node = tree.node(NodeId(i));
        let mut out = String::new();
        if !node.is_tip() {
            out.push('(');
            for (k, child) in node.children.iter().enumerate() {
                if k > 0 {
                    out.push(',');
                }
                out.push_str(&std::mem::take(&mut parts[child.0]));
            }
            out.push(')');
        }
        if let Some(label) = &node.label {
            out.push_str(&quote_label(label));
        }
        if let Some(length) = node.length {
            out.push(':');
            out.push_str(&length.to_string());
        }
        parts[i] = out;
    }

    let mut text = std::mem::take(&mut parts[0]);
    text.push(';');
    text
}

fn quote_label(label: &str) -> String {
    if !label.is_empty() && !label.bytes().any(is_delimiter) && !label.contains(']') {
        return label.to_string();
    }
    format!("'{}'", label.replace('\'', "''"))
}

impl PhyloTree {
    /// Parse a tree from Newick text.
    pub fn from_newick(text: &str) -> PhyloResult<Self> {
        parse_newick(text)
    }

    /// Newick text for this tree.
    pub fn to_newick(&self) -> String {
        to_newick(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let tree = parse_newick("((A:1,B:2)ab:3,C:4);").unwrap();
        assert_eq!(tree.tip_labels(), vec!["A", "B", "C"]);
        assert_eq!(tree.node(NodeId(1)).label.as_deref(), Some("ab"));
        assert_eq!(tree.root_to_tip_distance("A").unwrap(), 4.0);
    }

    #[test]
    fn test_quoted_labels_and_comments() {
        let tree = parse_newick("('Stenella attenuata':1[&height=1], 'O''Brien':2 [note]) ;").unwrap();
        assert_eq!(tree.tip_labels(), vec!["Stenella attenuata", "O'Brien"]);
        let written = tree.to_newick();
        assert_eq!(written, "('Stenella attenuata':1,'O''Brien':2);");
    }

    #[test]
    fn test_root_length_is_not_an_edge() {
        let tree = parse_newick("(A:1,B:1):5;").unwrap();
        assert_eq!(tree.root_to_tip_distance("A").unwrap(), 1.0);
        assert_eq!(tree.total_length(), 2.0);
        assert_eq!(tree.to_newick(), "(A:1,B:1):5;");
    }

    #[test]
    fn test_scientific_notation_lengths() {
        let tree = parse_newick("(A:1e-2,B:2.5E1);").unwrap();
        assert!((tree.root_to_tip_distance("A").unwrap() - 0.01).abs() < 1e-12);
        assert_eq!(tree.root_to_tip_distance("B").unwrap(), 25.0);
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            "(A:1,B:1)",
            "(A:1,B:1;",
            "A:1,B:1);",
            "(A:1,,B:1);",
            "(A:1,B:x);",
            "(A:1,B:1); C",
            "(A:1 B:1);",
            "('A:1,B:1);",
            "(A:1,B:1)[unclosed;",
        ];
        for case in cases {
            assert!(
                matches!(parse_newick(case), Err(PhyloError::Syntax { .. })),
                "expected syntax error for {case}"
            );
        }
    }

    #[test]
    fn test_missing_branch_length() {
        assert!(matches!(
            parse_newick("(A:1,B);"),
            Err(PhyloError::MissingBranchLength(ref l)) if l == "B"
        ));
    }

    #[test]
    fn test_writer_output_parses_to_same_shape() {
        let text = "(((A:1,B:1):2,C:3)x:1,D:4);";
        let tree = parse_newick(text).unwrap();
        assert_eq!(tree.to_newick(), text);
    }
}
