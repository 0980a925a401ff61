#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use pivot_builder::{data::Value, files::LoadedFile, frame::Table};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn fixture_str(name: &str) -> String {
    fixture_path(name).to_string_lossy().into_owned()
}

/// Scratch directory that is removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builds a table from string literals; numeric-looking cells become
/// integers and empty cells are missing.
pub fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell.trim() {
                    "" => None,
                    text => Some(
                        text.parse::<i64>()
                            .map(Value::Integer)
                            .unwrap_or_else(|_| Value::from(text)),
                    ),
                })
                .collect()
        })
        .collect();
    Table::from_rows(headers.iter().map(|h| h.to_string()).collect(), rows).expect("valid table")
}

pub fn loaded(id: &str, headers: &[&str], rows: &[&[&str]]) -> LoadedFile {
    LoadedFile::from_table(id, table(headers, rows))
}

/// Sales rows used across the pivot scenarios.
pub fn sales() -> Table {
    table(
        &["region", "amount"],
        &[&["east", "10"], &["east", "5"], &["west", "7"]],
    )
}
