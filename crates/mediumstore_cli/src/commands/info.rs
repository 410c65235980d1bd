//! Info command implementation.

use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store};
use serde::Serialize;
use std::path::Path;

/// File information.
#[derive(Debug, Serialize)]
pub struct InfoResult {
    /// File path.
    pub path: String,
    /// Length in bytes.
    pub length: u64,
    /// Whether the file can be edited.
    pub writable: bool,
    /// Whether the file supports random access.
    pub random_access: bool,
}

/// Collects information about `path` through a read-only store.
pub fn inspect(path: &Path, config: MediumConfig) -> Result<InfoResult, Box<dyn std::error::Error>> {
    let medium = Medium::file(path, MediumAccess::ReadOnly, config)?;
    let mut store = Store::new(medium.clone());
    store.open()?;

    let writable = std::fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false);
    let result = InfoResult {
        path: path.display().to_string(),
        length: medium.current_length().unwrap_or(0),
        writable,
        random_access: medium.is_random_access(),
    };

    store.close()?;
    Ok(result)
}

/// Runs the info command.
pub fn run(path: &Path, config: MediumConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, config)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Path:          {}", result.path);
            println!("Length:        {} bytes", result.length);
            println!("Writable:      {}", result.writable);
            println!("Random access: {}", result.random_access);
        }
    }

    Ok(())
}
