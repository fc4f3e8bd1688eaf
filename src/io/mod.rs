use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context, Result};

use crate::parser::LoadOptions;
use crate::tree::Tree;

/// Read a tree file and load it into the session. Failures surface both
/// through the returned error and the tree's event stream.
pub fn load_tree_file(tree: &mut Tree, path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read tree file: {}", path.display()))?;

    let options = LoadOptions {
        format: format_hint(path),
    };

    let failure: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&failure);
    tree.load(
        &raw,
        &options,
        Some(Box::new(move |error| {
            *sink.borrow_mut() = error.map(|err| format!("{err:#}"));
        })),
    );

    let failure = failure.borrow().clone();
    if let Some(message) = failure {
        bail!("{message}");
    }
    Ok(())
}

/// Explicit parser selection from the file extension, where it is
/// unambiguous; otherwise fall back to content auto-detection.
fn format_hint(path: &Path) -> Option<String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("nwk") | Some("tre") | Some("tree") | Some("newick") => Some("newick".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_hints_pick_the_newick_parser() {
        assert_eq!(
            format_hint(Path::new("sample.nwk")).as_deref(),
            Some("newick")
        );
        assert_eq!(
            format_hint(Path::new("sample.tre")).as_deref(),
            Some("newick")
        );
        assert_eq!(format_hint(Path::new("sample.xml")), None);
    }

    #[test]
    fn loads_a_tree_file_from_disk() {
        let path = std::env::temp_dir().join("arborview_io_test.nwk");
        fs::write(&path, "((A:1,B:2):0.5,C:3);\n").unwrap();

        let mut tree = Tree::new();
        load_tree_file(&mut tree, &path).unwrap();
        assert_eq!(tree.leaves.len(), 3);
        assert!(tree.drawn);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn unreadable_files_report_context() {
        let mut tree = Tree::new();
        let err = load_tree_file(&mut tree, Path::new("/nonexistent/tree.nwk")).unwrap_err();
        assert!(err.to_string().contains("failed to read tree file"));
    }
}
