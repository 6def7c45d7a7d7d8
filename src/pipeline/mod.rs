//! Pipeline driver.
//!
//! Row-wise mode walks the configured directory roots in an explicit stage
//! order (catalog before logs, so fact rows can resolve against a populated
//! catalog), loads each file through the matching handler and logs progress
//! per file. Set-wise mode is stage-then-transform with no per-file
//! iteration. The driver holds no state across runs.

use crate::config::Config;
use crate::errors::EtlError;
use crate::loader::{row_wise, staged};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Which handler a stage's files go through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileKind {
    SongCatalog,
    SessionLogs,
}

/// One row-wise stage: a directory root and the handler for its files.
pub struct Stage {
    pub root: PathBuf,
    pub kind: FileKind,
}

/// The row-wise stage list in dependency order.
pub fn stages(config: &Config) -> Vec<Stage> {
    vec![
        Stage {
            root: config.sources.song_data.clone(),
            kind: FileKind::SongCatalog,
        },
        Stage {
            root: config.sources.log_data.clone(),
            kind: FileKind::SessionLogs,
        },
    ]
}

/// Recursively collect the eligible `.json` files under a root, sorted so
/// discovery (and therefore commit) order is deterministic.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>, EtlError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk failed"));
            EtlError::io(root, source)
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Run the row-wise pipeline: every stage, every file, one commit per file.
/// A file failure aborts the run; there is no retry or skip bookkeeping.
pub async fn run_row_wise(pool: &PgPool, config: &Config) -> Result<(), EtlError> {
    let interval = config.etl.progress_update_interval.max(1);

    for stage in stages(config) {
        let files = discover_files(&stage.root)?;
        info!("{} files found in {}", files.len(), stage.root.display());

        for (i, file) in files.iter().enumerate() {
            match stage.kind {
                FileKind::SongCatalog => row_wise::process_song_file(pool, file).await?,
                FileKind::SessionLogs => {
                    row_wise::process_log_file(pool, file).await?;
                }
            }
            let done = i + 1;
            if done % interval == 0 || done == files.len() {
                info!("{}/{} files processed.", done, files.len());
            }
        }
    }
    Ok(())
}

/// Run the set-wise pipeline: bulk copy both categories into staging, then
/// transform inside the engine.
pub async fn run_set_wise(pool: &PgPool, config: &Config) -> Result<(), EtlError> {
    staged::stage_all(pool, &config.bulk).await?;
    staged::transform_all(pool).await?;
    Ok(())
}
