//! Driving configuration
//!
//! A CSV file lists one session per row:
//!
//! ```text
//! username,virtual_fs,initial_script
//! alice,/tmp/alice_fs.tar,/tmp/alice_startup.txt
//! ```
//!
//! Rows are returned in file order. An empty `initial_script` cell means the
//! session has no startup script.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::session::SessionBuilder;

/// One row of the driving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRecord {
    /// Session identity
    pub username: String,
    /// Archive backing the session's tree
    pub virtual_fs: PathBuf,
    /// Startup script replayed after bootstrap
    #[serde(default)]
    pub initial_script: Option<PathBuf>,
}

impl SessionRecord {
    /// Builder pre-filled from this record.
    pub fn builder(&self) -> SessionBuilder {
        let builder = SessionBuilder::new(self.username.clone(), self.virtual_fs.clone());
        match &self.initial_script {
            Some(script) if !script.as_os_str().is_empty() => builder.script(script.clone()),
            _ => builder,
        }
    }
}

/// Load all session records from a CSV file.
pub fn load_records(path: &Path) -> Result<Vec<SessionRecord>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    parse_records(reader)
}

fn parse_records<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<SessionRecord>> {
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: SessionRecord = row?;
        if record.username.is_empty() {
            return Err(Error::Config(format!(
                "row {}: username must not be empty",
                records.len() + 1
            )));
        }
        records.push(record);
    }
    Ok(records)
}
