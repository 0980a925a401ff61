use std::{
    collections::BTreeMap,
    fmt,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};
use encoding_rs::{Encoding, UTF_8};
use log::{info, warn};

use crate::{frame::Table, io_utils, matching::FileId, workbook};

pub const MAX_FILE_SIZE_MB: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Tsv,
    Xlsx,
    Other,
}

impl FileType {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => FileType::Csv,
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => FileType::Tsv,
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls") => {
                FileType::Xlsx
            }
            _ => FileType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Loaded,
    Error(String),
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Pending => f.write_str("pending"),
            FileStatus::Loaded => f.write_str("loaded"),
            FileStatus::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// How inputs are read. The delimiter and encoding apply to delimited text,
/// the sheet to workbooks.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub sheet: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            sheet: None,
        }
    }
}

/// A registered input file and, once loaded, its in-memory table.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub id: FileId,
    pub path: PathBuf,
    pub file_type: FileType,
    pub selected_sheet: Option<String>,
    pub status: FileStatus,
    pub table: Option<Table>,
}

impl LoadedFile {
    pub fn new(path: &Path) -> Self {
        Self {
            id: path.display().to_string(),
            path: path.to_path_buf(),
            file_type: FileType::from_path(path),
            selected_sheet: None,
            status: FileStatus::Pending,
            table: None,
        }
    }

    pub fn from_table(id: &str, table: Table) -> Self {
        let path = PathBuf::from(id);
        Self {
            id: id.to_string(),
            file_type: FileType::from_path(&path),
            path,
            selected_sheet: None,
            status: FileStatus::Loaded,
            table: Some(table),
        }
    }

    /// Reads the file and records the outcome in `status`. Failures are
    /// logged and kept on the descriptor rather than returned.
    pub fn load(path: &Path, options: &LoadOptions) -> Self {
        let mut file = Self::new(path);
        match read_input(path, file.file_type, options) {
            Ok((table, sheet)) => {
                info!(
                    "Loaded {:?}: {} row(s) x {} column(s)",
                    path,
                    table.row_count(),
                    table.column_count()
                );
                file.table = Some(table);
                file.selected_sheet = sheet;
                file.status = FileStatus::Loaded;
            }
            Err(err) => {
                warn!("Failed to load {:?}: {err:#}", path);
                file.status = FileStatus::Error(format!("{err:#}"));
            }
        }
        file
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.clone())
    }

    /// File name, suffixed with the selected sheet when one is set.
    pub fn display_name(&self) -> String {
        match &self.selected_sheet {
            Some(sheet) => format!("{} [{}]", self.file_name(), sheet),
            None => self.file_name(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == FileStatus::Loaded && self.table.is_some()
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.table.as_ref().map(Table::headers)
    }
}

/// Reads one input into a table, plus the sheet it came from when that sheet
/// was chosen explicitly or is the workbook's only one.
fn read_input(
    path: &Path,
    file_type: FileType,
    options: &LoadOptions,
) -> Result<(Table, Option<String>)> {
    let size = fs::metadata(path)?.len();
    if size > MAX_FILE_SIZE_MB * 1024 * 1024 {
        bail!("File is {} MB; the limit is {MAX_FILE_SIZE_MB} MB", size / (1024 * 1024));
    }
    if file_type == FileType::Xlsx {
        let read = workbook::read_sheet(path, options.sheet.as_deref())?;
        let selected = read.selected.then_some(read.sheet);
        return Ok((read.table, selected));
    }
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let table = io_utils::read_table(path, delimiter, options.encoding)?;
    Ok((table, None))
}

/// Column lists of every loaded file, keyed by file id.
pub fn files_columns(files: &[LoadedFile]) -> BTreeMap<FileId, Vec<String>> {
    files
        .iter()
        .filter_map(|file| file.columns().map(|cols| (file.id.clone(), cols.to_vec())))
        .collect()
}
