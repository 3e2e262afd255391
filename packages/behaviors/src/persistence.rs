//! Loading and saving the persisted document through a host transport

use scribe_editor::{Editor, EditorError, EditorResult, TextFormat};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Document used when nothing usable was persisted: one empty paragraph
pub const DEFAULT_STATE: &str = r#"{"root":{"type":"root","version":1,"children":[{"type":"paragraph","version":1,"children":[]}]}}"#;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Where persisted state lives. `load` returns `None` when nothing was saved.
pub trait StateTransport {
    fn load(&self) -> Result<Option<String>, TransportError>;
    fn save(&self, state: &str) -> Result<(), TransportError>;
}

/// Stores the document as a JSON file
#[derive(Debug, Clone)]
pub struct FileTransport {
    path: PathBuf,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateTransport for FileTransport {
    fn load(&self) -> Result<Option<String>, TransportError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, state: &str) -> Result<(), TransportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, state)?;
        Ok(())
    }
}

/// Which document `load_initial_state` ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Persisted,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    Failed(String),
}

/// Import the persisted document, or the default one when the transport has
/// nothing, fails, or returns something that does not import. Highlight
/// formats never survive a reload.
pub fn load_initial_state(
    editor: &mut Editor,
    transport: &dyn StateTransport,
) -> EditorResult<LoadSource> {
    let source = match transport.load() {
        Ok(Some(state)) => match editor.import_state(&state) {
            Ok(_) => LoadSource::Persisted,
            Err(EditorError::MalformedImport(reason)) => {
                warn!(%reason, "persisted state rejected, using default document");
                LoadSource::Default
            }
            Err(err) => return Err(err),
        },
        Ok(None) => {
            debug!("no persisted state");
            LoadSource::Default
        }
        Err(err) => {
            warn!(error = %err, "state transport failed, using default document");
            LoadSource::Default
        }
    };
    if source == LoadSource::Default {
        editor.import_state(DEFAULT_STATE)?;
    }

    clear_highlights(editor)?;
    Ok(source)
}

fn clear_highlights(editor: &mut Editor) -> EditorResult<()> {
    editor.update(|editor| {
        let tx = editor.tx()?;
        let highlighted: Vec<_> = tx
            .store()
            .document_order()
            .into_iter()
            .filter(|&key| {
                tx.store()
                    .text(key)
                    .is_some_and(|text| text.has_format(TextFormat::HIGHLIGHT))
            })
            .collect();
        for key in highlighted {
            tx.update_text(key, |text| text.format.remove(TextFormat::HIGHLIGHT))?;
        }
        Ok(())
    })
}

/// Persist the current document. The editor is never modified.
pub fn save_state(editor: &Editor, transport: &dyn StateTransport) -> SaveStatus {
    let result = editor
        .export_state()
        .map_err(|err| err.to_string())
        .and_then(|state| transport.save(&state).map_err(|err| err.to_string()));
    match result {
        Ok(()) => SaveStatus::Saved,
        Err(reason) => {
            warn!(%reason, "saving state failed");
            SaveStatus::Failed(reason)
        }
    }
}
