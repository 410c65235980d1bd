//! Dump command implementation.

use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store};
use serde::Serialize;
use std::path::Path;

/// Bytes per line of the text dump.
const LINE_WIDTH: usize = 16;

/// A dumped byte range.
#[derive(Debug, Serialize)]
pub struct DumpResult {
    /// File path.
    pub path: String,
    /// First dumped byte.
    pub offset: u64,
    /// Number of bytes asked for.
    pub requested: usize,
    /// The bytes read, hex encoded.
    pub hex: String,
    /// Whether the file ended before `requested` bytes were read.
    pub end_of_medium: bool,
}

/// Reads up to `len` bytes at `offset` of `path`.
///
/// Hitting the end of the file is not an error; the bytes read up to it
/// are returned.
pub fn read(
    path: &Path,
    config: MediumConfig,
    offset: u64,
    len: usize,
) -> Result<DumpResult, Box<dyn std::error::Error>> {
    let mut store = Store::new(Medium::file(path, MediumAccess::ReadOnly, config)?);
    store.open()?;

    let at = store.create_medium_offset(offset)?;
    let (bytes, end_of_medium) = match store.get_data(at, len) {
        Ok(bytes) => (bytes, false),
        Err(err) => match err.as_end_of_medium() {
            Some(eom) => (eom.bytes.clone(), true),
            None => return Err(err.into()),
        },
    };
    store.close()?;

    Ok(DumpResult {
        path: path.display().to_string(),
        offset,
        requested: len,
        hex: hex::encode(&bytes),
        end_of_medium,
    })
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    config: MediumConfig,
    offset: u64,
    len: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = read(path, config, offset, len)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            let bytes = hex::decode(&result.hex)?;
            for line in format_lines(result.offset, &bytes) {
                println!("{line}");
            }
            if result.end_of_medium {
                println!("(end of medium after {} bytes)", bytes.len());
            }
        }
    }

    Ok(())
}

/// Formats `bytes` as hex dump lines starting at `offset`.
fn format_lines(offset: u64, bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(LINE_WIDTH)
        .enumerate()
        .map(|(index, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| hex::encode([*b])).collect();
            let ascii: String = chunk
                .iter()
                .map(|b| {
                    if b.is_ascii_graphic() || *b == b' ' {
                        *b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            format!(
                "{:08x}  {:<width$}  |{}|",
                offset + (index * LINE_WIDTH) as u64,
                hex.join(" "),
                ascii,
                width = LINE_WIDTH * 3 - 1
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_file(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.bin");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn dump_range() {
        let (_dir, path) = sample_file(b"HELLOWORLD");
        let result = read(&path, MediumConfig::default(), 5, 5).unwrap();
        assert_eq!(result.hex, hex::encode(b"WORLD"));
        assert!(!result.end_of_medium);
    }

    #[test]
    fn dump_past_end() {
        let (_dir, path) = sample_file(b"HELLOWORLD");
        let config = MediumConfig::new().max_read_write_block_size(3);
        let result = read(&path, config, 8, 10).unwrap();
        assert_eq!(result.hex, hex::encode(b"LD"));
        assert!(result.end_of_medium);
    }

    #[test]
    fn json_output() {
        let (_dir, path) = sample_file(b"abc");
        let result = read(&path, MediumConfig::default(), 0, 3).unwrap();
        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json["hex"], "616263");
        assert_eq!(json["requested"], 3);
    }

    #[test]
    fn text_lines() {
        let bytes: Vec<u8> = (b'a'..=b'z').collect();
        let lines = format_lines(0x10, &bytes);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000010  61 62 63"));
        assert!(lines[0].ends_with("|abcdefghijklmnop|"));
        assert!(lines[1].starts_with("00000020  71 72"));
        assert!(lines[1].ends_with("|qrstuvwxyz|"));
    }
}
