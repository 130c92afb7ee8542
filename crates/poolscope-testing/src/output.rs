//! Readers for shred output trees.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Decode one `part-*.jsonl.gz` file into its JSON lines.
pub fn read_jsonl_gz(path: &Path) -> Result<Vec<Value>> {
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(GzDecoder::new(file));
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line).with_context(|| format!("parse {}", line))?);
    }
    Ok(rows)
}

/// Every part file under a stream directory, sorted by path.
pub fn part_files(stream_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(stream_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.to_string_lossy().ends_with(".jsonl.gz"))
        .collect();
    files.sort();
    files
}

/// All rows of a stream directory, part files in path order.
pub fn read_stream(stream_dir: &Path) -> Result<Vec<Value>> {
    let mut rows = Vec::new();
    for path in part_files(stream_dir) {
        rows.extend(read_jsonl_gz(&path)?);
    }
    Ok(rows)
}

/// Part files relative to `stream_dir`, as `/`-joined strings.
pub fn relative_parts(stream_dir: &Path) -> Vec<String> {
    part_files(stream_dir)
        .iter()
        .filter_map(|p| p.strip_prefix(stream_dir).ok())
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}
