use super::open_document;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use scribe_editor::{NodeKind, NodeStore};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Persisted document (JSON)
    pub file: PathBuf,
}

/// Node counts per kind, skipping kinds that do not occur
pub(crate) fn kind_counts(store: &NodeStore) -> Vec<(NodeKind, usize)> {
    NodeKind::ALL
        .iter()
        .map(|&kind| (kind, store.nodes_of_kind(kind).len()))
        .filter(|&(_, count)| count > 0)
        .collect()
}

pub fn check(args: CheckArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let path = cwd.join(&args.file);
    let editor = open_document(&path, &config)?;
    let store = editor.store();

    if let Err(err) = store.check_integrity() {
        println!("  {} {} - {}", "✗".red(), args.file.display(), err);
        return Err(err.into());
    }

    println!("  {} {}", "✓".green(), args.file.display());
    for (kind, count) in kind_counts(store) {
        println!("    {:<18} {}", kind.to_string().bright_white(), count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_editor::Editor;

    const DOCUMENT: &str = r#"{"root":{"type":"root","children":[
        {"type":"paragraph","children":[
            {"type":"text","text":"one"},
            {"type":"text","text":"two","format":1}
        ]},
        {"type":"horizontal-divider"}
    ]}}"#;

    #[test]
    fn test_counts_each_kind_present() {
        let mut editor = Editor::default();
        editor.import_state(DOCUMENT).unwrap();
        let counts = kind_counts(editor.store());
        assert!(counts.contains(&(NodeKind::Root, 1)));
        assert!(counts.contains(&(NodeKind::Paragraph, 1)));
        assert!(counts.contains(&(NodeKind::Text, 2)));
        assert!(counts.contains(&(NodeKind::HorizontalDivider, 1)));
        assert_eq!(counts.len(), 4);
    }

    #[test]
    fn test_check_rejects_malformed_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), r#"{"root":{"type":"text"}}"#).unwrap();
        let args = CheckArgs {
            file: PathBuf::from("broken.json"),
        };
        assert!(check(args, dir.path()).is_err());
    }
}
