use anyhow::Result;

use crate::tree::{NodeId, Tree};

mod newick;

pub use newick::NewickParser;

/// Options accompanying a [`Tree::load`](crate::tree::Tree::load) call.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit parser selection by name; `None` auto-detects.
    pub format: Option<String>,
}

/// One parsing job: the source text and the pre-created root the parser
/// must populate.
pub struct ParseJob<'a> {
    pub text: &'a str,
    pub root: NodeId,
    pub options: &'a LoadOptions,
}

/// External collaborator contract: populate the root's subtree (children,
/// branch lengths, labels) from the job's text and produce exactly one
/// outcome. Whether the work runs synchronously or is scheduled is the
/// parser's business; the tree does not assume either timing.
pub trait TreeParser {
    fn name(&self) -> &'static str;

    /// Cheap content/extension matcher used by format auto-detection.
    fn matches(&self, input: &str) -> bool;

    fn parse(&self, tree: &mut Tree, job: &ParseJob<'_>) -> Result<()>;
}

pub static NEWICK: NewickParser = NewickParser;

/// Registered parsers, tried in order during auto-detection.
pub fn all() -> [&'static dyn TreeParser; 1] {
    [&NEWICK]
}

pub fn by_name(name: &str) -> Option<&'static dyn TreeParser> {
    all().into_iter().find(|parser| parser.name() == name)
}
