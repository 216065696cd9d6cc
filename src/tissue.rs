use crate::error::ModelError;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Per-cell sensitivity multiplier, `columns x rows`, stored column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TissueMap {
    columns: usize,
    rows: usize,
    values: Vec<f64>,
}

impl TissueMap {
    /// Tissue with no spatial variation.
    pub fn uniform(columns: usize, rows: usize) -> Self {
        Self { columns, rows, values: vec![1.0; columns * rows] }
    }

    /// Loads the tissue named `source` from `data_dir`, or uniform tissue when `source` is empty.
    pub fn load(source: &str, data_dir: impl AsRef<Path>, columns: usize, rows: usize) -> Result<Self, ModelError> {
        if source.is_empty() {
            debug!("No tissue source given, using uniform tissue.");
            return Ok(Self::uniform(columns, rows));
        }

        let path = resolve_source(source, data_dir.as_ref());
        info!("Reading tissue from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| ModelError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, columns, rows)
    }

    /// Parses comma-separated tissue rows.
    ///
    /// Each file row runs along the column axis, so the file holds `rows` lines
    /// of `columns` values and is transposed into the column-major grid.
    /// A line is a comment when its first non-blank character is `#`.
    pub fn parse(text: &str, columns: usize, rows: usize) -> Result<Self, ModelError> {
        // csv only recognises '#' in the first byte, so drop leading whitespace
        let text: String = text.lines().map(|line| format!("{}\n", line.trim_start())).collect();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut file_rows: Vec<Vec<f64>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ModelError::Format {
                line: e.position().map_or(0, |p| p.line()),
                reason: e.to_string(),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| ModelError::Format {
                        line,
                        reason: format!("'{field}' is not a number"),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;

            if let Some(first) = file_rows.first() {
                if first.len() != row.len() {
                    return Err(ModelError::Format {
                        line,
                        reason: format!("expected {} values, found {}", first.len(), row.len()),
                    });
                }
            }
            file_rows.push(row);
        }

        let found_cols = file_rows.first().map_or(0, Vec::len);
        // found shape is reported after the transpose
        if file_rows.len() != rows || found_cols != columns {
            return Err(ModelError::ShapeMismatch {
                expected: (columns, rows),
                found: (found_cols, file_rows.len()),
            });
        }

        let mut values = vec![0.0; columns * rows];
        for (j, row) in file_rows.iter().enumerate() {
            for (i, value) in row.iter().enumerate() {
                values[i * rows + j] = *value;
            }
        }
        Ok(Self { columns, rows, values })
    }

    #[inline]
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.rows + j]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Places `source` in `data_dir`, appending `.tis` unless it already names a `.tis` or `.csv` file.
pub fn resolve_source(source: &str, data_dir: &Path) -> PathBuf {
    let mut name = source.to_string();
    if !name.contains(".tis") && !name.contains(".csv") {
        name.push_str(".tis");
    }
    data_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_is_transposed_onto_columns() {
        let tissue = TissueMap::parse("1.0,0.5,0.25,0.1\n", 4, 1).unwrap();
        assert_eq!(tissue.as_slice(), &[1.0, 0.5, 0.25, 0.1]);
        assert_eq!(tissue.value(0, 0), 1.0);
        assert_eq!(tissue.value(3, 0), 0.1);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# brain slice\n1, 2, 3\n\n# second row\n4, 5, 6\n";
        let tissue = TissueMap::parse(text, 3, 2).unwrap();
        assert_eq!(tissue.value(0, 0), 1.0);
        assert_eq!(tissue.value(0, 1), 4.0);
        assert_eq!(tissue.value(2, 0), 3.0);
        assert_eq!(tissue.value(2, 1), 6.0);
    }

    #[test]
    fn indented_comments_are_skipped() {
        let text = "  # indented note\n1.0,0.5\n\t# tabbed\n";
        let tissue = TissueMap::parse(text, 2, 1).unwrap();
        assert_eq!(tissue.as_slice(), &[1.0, 0.5]);
    }

    #[test]
    fn non_numeric_field_is_a_format_error() {
        let err = TissueMap::parse("1.0,abc\n", 2, 1).unwrap_err();
        assert!(matches!(err, ModelError::Format { .. }), "{err:?}");
    }

    #[test]
    fn ragged_rows_are_a_format_error() {
        let err = TissueMap::parse("1,2,3\n4,5\n", 3, 2).unwrap_err();
        assert!(matches!(err, ModelError::Format { .. }), "{err:?}");
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let err = TissueMap::parse("1,2,3\n", 2, 1).unwrap_err();
        assert_eq!(err, ModelError::ShapeMismatch { expected: (2, 1), found: (3, 1) });

        let err = TissueMap::parse("# only comments\n", 2, 1).unwrap_err();
        assert_eq!(err, ModelError::ShapeMismatch { expected: (2, 1), found: (0, 0) });
    }

    #[test]
    fn empty_source_gives_uniform_tissue() {
        let tissue = TissueMap::load("", "does-not-exist", 2, 3).unwrap();
        assert_eq!(tissue, TissueMap::uniform(2, 3));
        assert!(tissue.as_slice().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn source_names_get_the_tissue_extension() {
        let dir = Path::new("data");
        assert_eq!(resolve_source("brain", dir), dir.join("brain.tis"));
        assert_eq!(resolve_source("brain.csv", dir), dir.join("brain.csv"));
        assert_eq!(resolve_source("brain.tis", dir), dir.join("brain.tis"));
    }

    #[test]
    fn load_reads_from_the_data_directory() {
        let dir = std::env::temp_dir().join(format!("resonance-tissue-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("patch.tis"), "1,0.1\n0.1,1\n").unwrap();

        let tissue = TissueMap::load("patch", &dir, 2, 2).unwrap();
        assert_eq!(tissue.value(1, 0), 0.1);
        assert_eq!(tissue.value(1, 1), 1.0);

        let missing = TissueMap::load("absent", &dir, 2, 2).unwrap_err();
        assert!(matches!(missing, ModelError::Io { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
