use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::input::InputError;

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, InputError> {
    let file = File::open(path).map_err(|e| {
        InputError::MissingInput(format!("cannot open {}: {e}", path.display()))
    })?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Line-oriented tab-separated reader. Blank lines are skipped and trailing
/// newline characters are stripped; fields are trimmed.
pub struct TsvLines {
    reader: Box<dyn BufRead>,
    buf: String,
    line_no: usize,
}

impl TsvLines {
    pub fn open(path: &Path) -> Result<Self, InputError> {
        Ok(Self {
            reader: open_maybe_gz(path)?,
            buf: String::new(),
            line_no: 0,
        })
    }

    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn next_fields(&mut self) -> Result<Option<Vec<String>>, InputError> {
        loop {
            self.buf.clear();
            let read = self.reader.read_line(&mut self.buf)?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.split('\t').map(|s| s.trim().to_string()).collect()));
        }
    }
}

/// A small header-plus-rows table, used for the reference tables
/// (interactions, sample sheet, status labels, cell metadata).
#[derive(Debug, Clone)]
pub struct TsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn read(path: &Path) -> Result<Self, InputError> {
        let mut lines = TsvLines::open(path)?;
        let columns = lines.next_fields()?.ok_or_else(|| {
            InputError::Parse(format!("{} is empty", path.display()))
        })?;
        let mut rows = Vec::new();
        while let Some(fields) = lines.next_fields()? {
            rows.push(fields);
        }
        Ok(Self { columns, rows })
    }

    /// Case-insensitive lookup of the first column matching any of `names`.
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        self.columns.iter().position(|c| {
            let lower = c.to_ascii_lowercase();
            names.iter().any(|n| lower == n.to_ascii_lowercase())
        })
    }

    pub fn require_column(&self, names: &[&str], path: &Path) -> Result<usize, InputError> {
        self.column(names).ok_or_else(|| {
            InputError::InvalidInput(format!(
                "{} is missing required column {}",
                path.display(),
                names[0]
            ))
        })
    }
}

pub fn field(row: &[String], col: usize) -> &str {
    row.get(col).map(|s| s.as_str()).unwrap_or("")
}
