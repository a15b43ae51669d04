use std::path::{Path, PathBuf};

use crate::error::{io_err, CorrTrackError, Result};

/// A `width x height` reference pattern correlated against image patches.
///
/// Loaded from a UTF-8 text file: one row per non-empty line, fields
/// separated by horizontal tabs, all rows the same field count, all fields
/// parseable as `f64` (scientific notation allowed). Immutable once loaded.
#[derive(Clone, Debug)]
pub struct Filter {
    width: usize,
    height: usize,
    values: Vec<f64>,
    source_path: PathBuf,
}

impl Filter {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Value at `(x, y)` in row-major order. Panics if out of range — the
    /// correlation engine only ever indexes within `(width, height)`.
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x]
    }

    /// Build a filter directly from an in-memory grid, bypassing file I/O.
    /// Used by tests in other modules that need a quick reference pattern.
    #[doc(hidden)]
    pub fn load_from_rows(rows: &[Vec<f64>]) -> Self {
        let width = rows[0].len();
        assert!(rows.iter().all(|r| r.len() == width));
        let height = rows.len();
        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        Self {
            width,
            height,
            values,
            source_path: PathBuf::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let mut row = Vec::new();
            for field in line.split('\t') {
                let value: f64 = field.trim().parse().map_err(|_| {
                    CorrTrackError::FilterFormat(format!("field {field:?} is not a valid number"))
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(CorrTrackError::FilterFormat("filter file is empty".into()));
        }

        let width = rows[0].len();
        if width == 0 {
            return Err(CorrTrackError::FilterFormat("filter rows have no fields".into()));
        }
        if rows.iter().any(|r| r.len() != width) {
            return Err(CorrTrackError::FilterFormat(
                "filter rows have inconsistent field counts".into(),
            ));
        }

        let height = rows.len();
        let values: Vec<f64> = rows.into_iter().flatten().collect();

        Ok(Self {
            width,
            height,
            values,
            source_path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_rectangular_grid() {
        let f = write_tmp("1.0\t2.0\t3.0\n4.0\t5.0\t6.0\n");
        let filter = Filter::load(f.path()).unwrap();
        assert_eq!(filter.width(), 3);
        assert_eq!(filter.height(), 2);
        assert_eq!(filter.value(0, 0), 1.0);
        assert_eq!(filter.value(2, 1), 6.0);
    }

    #[test]
    fn tolerates_crlf_and_trailing_newline() {
        let f = write_tmp("1\t2\r\n3\t4\r\n\r\n");
        let filter = Filter::load(f.path()).unwrap();
        assert_eq!(filter.width(), 2);
        assert_eq!(filter.height(), 2);
    }

    #[test]
    fn accepts_scientific_notation() {
        let f = write_tmp("1.5e-3\t2E2\n");
        let filter = Filter::load(f.path()).unwrap();
        assert_eq!(filter.value(0, 0), 1.5e-3);
        assert_eq!(filter.value(1, 0), 2e2);
    }

    #[test]
    fn rejects_ragged_rows() {
        let f = write_tmp("1\t2\t3\n4\t5\n");
        assert!(matches!(Filter::load(f.path()), Err(CorrTrackError::FilterFormat(_))));
    }

    #[test]
    fn rejects_empty_file() {
        let f = write_tmp("");
        assert!(matches!(Filter::load(f.path()), Err(CorrTrackError::FilterFormat(_))));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let f = write_tmp("1\tabc\n");
        assert!(matches!(Filter::load(f.path()), Err(CorrTrackError::FilterFormat(_))));
    }
}
