pub mod check;
pub mod init;
pub mod normalize;
pub mod text;

pub use check::{check, CheckArgs};
pub use init::{init, InitArgs};
pub use normalize::{normalize, NormalizeArgs};
pub use text::{text, TextArgs};

use crate::config::Config;
use anyhow::{Context, Result};
use scribe_editor::Editor;
use std::fs;
use std::path::Path;

/// Read a persisted document into a fresh editor built from `config`
pub(crate) fn open_document(path: &Path, config: &Config) -> Result<Editor> {
    let json =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let mut editor = Editor::new(config.editor.clone());
    editor
        .import_state(&json)
        .with_context(|| format!("cannot import {}", path.display()))?;
    Ok(editor)
}
