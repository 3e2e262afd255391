use super::open_document;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use scribe_behaviors::BehaviorSet;
use scribe_editor::Editor;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Persisted document (JSON)
    pub file: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Install the configured behaviors and run their transforms over every node
pub(crate) fn normalized_state(editor: &mut Editor, config: &Config) -> Result<String> {
    let mut behaviors = BehaviorSet::standard(&config.behaviors);
    behaviors.install(editor);
    editor.update(|editor| {
        editor.tx()?.mark_all_dirty();
        Ok(())
    })?;
    debug!(version = editor.version(), "normalized");
    Ok(editor.export_state()?)
}

pub fn normalize(args: NormalizeArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut editor = open_document(&cwd.join(&args.file), &config)?;
    let state = normalized_state(&mut editor, &config)?;

    match args.out {
        Some(out) => {
            fs::write(cwd.join(&out), &state)?;
            println!(
                "  {} {} → {}",
                "✓".green(),
                args.file.display(),
                out.display()
            );
        }
        None => println!("{}", state),
    }
    Ok(())
}
