//! CSV import of reference data, the same importer the admin API uses.
//!
//! Expected columns:
//!
//! | kind         | required             | optional      |
//! |--------------|----------------------|---------------|
//! | `categories` | `name`               | `description` |
//! | `units`      | `name, abbreviation` |               |
//! | `states`     | `name`               | `code`        |
//! | `cities`     | `name, state`        |               |

use std::path::Path;

use harvest_market::services::import::{ImportError, ImportKind, Importer};
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum ImportCommandError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Import `file` into the table named by `kind`.
pub async fn run(kind: &str, file: &Path) -> Result<(), ImportCommandError> {
    let kind: ImportKind = kind.parse()?;

    let data = tokio::fs::read(file)
        .await
        .map_err(|source| ImportCommandError::Read {
            path: file.display().to_string(),
            source,
        })?;

    let pool = connect().await?;
    let report = Importer::new(&pool).import(kind, &data).await?;

    for skipped in &report.skipped {
        tracing::info!(line = skipped.line, "Skipped: {}", skipped.reason);
    }
    for error in &report.errors {
        tracing::warn!(line = error.line, "Rejected: {}", error.message);
    }
    tracing::info!(
        kind = kind.as_str(),
        inserted = report.inserted,
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "Import complete"
    );

    Ok(())
}
