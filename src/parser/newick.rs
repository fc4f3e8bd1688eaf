use anyhow::{bail, Context, Result};

use super::{ParseJob, TreeParser};
use crate::tree::{NodeId, Tree};

/// Recursive-descent parser for Newick tree strings.
///
/// Accepts multifurcating clades, quoted and bare labels, absent branch
/// lengths (treated as zero) and bracketed comments. Leaf labels double as
/// node ids; collisions are resolved or rejected by the tree itself.
pub struct NewickParser;

impl TreeParser for NewickParser {
    fn name(&self) -> &'static str {
        "newick"
    }

    fn matches(&self, input: &str) -> bool {
        input.trim_start().starts_with('(') || input.trim_end().ends_with(".nwk")
    }

    fn parse(&self, tree: &mut Tree, job: &ParseJob<'_>) -> Result<()> {
        let mut cursor = Cursor::new(job.text);
        cursor.skip_trivia();
        parse_clade(tree, &mut cursor, job.root)?;
        cursor.skip_trivia();
        if cursor.peek() != Some(';') {
            bail!("expected ';' at offset {}", cursor.offset());
        }
        cursor.bump();
        cursor.skip_trivia();
        if !cursor.at_end() {
            bail!("unexpected content after ';' at offset {}", cursor.offset());
        }
        Ok(())
    }
}

fn parse_clade(tree: &mut Tree, cursor: &mut Cursor<'_>, node: NodeId) -> Result<()> {
    cursor.skip_trivia();

    if cursor.peek() == Some('(') {
        cursor.bump();
        loop {
            let child = tree.create_branch();
            tree.attach_child(node, child);
            parse_clade(tree, cursor, child)?;
            cursor.skip_trivia();
            match cursor.peek() {
                Some(',') => {
                    cursor.bump();
                }
                Some(')') => {
                    cursor.bump();
                    break;
                }
                other => bail!(
                    "expected ',' or ')' at offset {}, found {:?}",
                    cursor.offset(),
                    other
                ),
            }
        }
    }

    cursor.skip_trivia();
    let label = cursor.read_label()?;
    if !label.is_empty() {
        let branch = tree.branch_mut(node);
        branch.label = Some(label.clone());
        branch.id = label;
    }

    cursor.skip_trivia();
    if cursor.peek() == Some(':') {
        cursor.bump();
        cursor.skip_trivia();
        let length = cursor.read_number()?;
        tree.branch_mut(node).branch_length = length;
    }
    Ok(())
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    /// Skip whitespace and bracketed comment blocks.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.bump(),
                Some('[') => {
                    while let Some(c) = self.peek() {
                        self.bump();
                        if c == ']' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn read_label(&mut self) -> Result<String> {
        if self.peek() == Some('\'') {
            self.bump();
            let mut label = String::new();
            loop {
                match self.peek() {
                    Some('\'') => {
                        self.bump();
                        break;
                    }
                    Some(c) => {
                        label.push(c);
                        self.bump();
                    }
                    None => bail!("unterminated quoted label at offset {}", self.offset()),
                }
            }
            return Ok(label);
        }

        let mut label = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '(' | ')' | ':' | ';' | '[') || c.is_whitespace() {
                break;
            }
            label.push(c);
            self.bump();
        }
        Ok(label)
    }

    fn read_number(&mut self) -> Result<f64> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E') {
                self.bump();
            } else {
                break;
            }
        }
        let slice = &self.text[start..self.pos];
        slice
            .parse::<f64>()
            .with_context(|| format!("invalid branch length {slice:?} at offset {start}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LoadOptions;

    fn parse(newick: &str) -> Result<Tree> {
        let mut tree = Tree::new();
        let root = tree.create_branch();
        tree.branch_mut(root).id = "root".to_string();
        tree.root = Some(root);
        let options = LoadOptions::default();
        let job = ParseJob {
            text: newick,
            root,
            options: &options,
        };
        NewickParser.parse(&mut tree, &job)?;
        tree.extract_nested_branches()?;
        Ok(tree)
    }

    #[test]
    fn parses_labels_and_lengths() {
        let tree = parse("(A:1,B:2.5,C:3e-1);").unwrap();
        assert_eq!(tree.leaves.len(), 3);
        let b = tree.node_by_id("B").unwrap();
        assert_eq!(tree.nodes[b].branch_length, 2.5);
        let c = tree.node_by_id("C").unwrap();
        assert!((tree.nodes[c].branch_length - 0.3).abs() < 1e-12);
    }

    #[test]
    fn parses_nested_clades_with_internal_labels() {
        let tree = parse("((A:1,B:2)AB:0.5,C:3)root_clade:0;").unwrap();
        let ab = tree.node_by_id("AB").unwrap();
        assert_eq!(tree.nodes[ab].children.len(), 2);
        assert_eq!(tree.nodes[ab].branch_length, 0.5);
    }

    #[test]
    fn missing_lengths_default_to_zero() {
        let tree = parse("(A,B:1);").unwrap();
        let a = tree.node_by_id("A").unwrap();
        assert_eq!(tree.nodes[a].branch_length, 0.0);
    }

    #[test]
    fn quoted_labels_and_comments_are_handled() {
        let tree = parse("[&R] ('taxon one':1,B[comment]:2);").unwrap();
        assert!(tree.node_by_id("taxon one").is_some());
        assert_eq!(tree.leaves.len(), 2);
    }

    #[test]
    fn multifurcations_are_preserved() {
        let tree = parse("(A:1,B:2,C:3,D:4,E:5);").unwrap();
        let root = tree.root.unwrap();
        assert_eq!(tree.nodes[root].children.len(), 5);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse("(A:1,B:2").is_err());
        assert!(parse("(A:1,B:2);extra").is_err());
        assert!(parse("(A:abc);").is_err());
    }

    #[test]
    fn matcher_accepts_newick_content() {
        assert!(NewickParser.matches("  (A,B);"));
        assert!(NewickParser.matches("trees/sample.nwk"));
        assert!(!NewickParser.matches("#NEXUS"));
    }
}
