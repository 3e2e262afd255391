use super::open_document;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct TextArgs {
    /// Persisted document (JSON)
    pub file: PathBuf,
}

pub fn text(args: TextArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let editor = open_document(&cwd.join(&args.file), &config)?;
    println!("{}", editor.text_content());
    Ok(())
}
