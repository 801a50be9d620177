use std::{fs, path::Path};

use ndarray::prelude::*;

use crate::error::{EngineErr, Result};

/// Loads a points file: one sample per row, exactly `input_dim` numeric
/// feature columns plus one trailing label column.
///
/// `.csv` files are comma-separated, everything else whitespace-separated.
/// Any malformed row aborts the whole load; nothing is partially applied.
///
/// # Returns
/// The points (`input_dim × samples`) and the per-sample labels.
pub fn load_points_file(
    path: impl AsRef<Path>,
    input_dim: usize,
) -> Result<(Array2<f32>, Vec<String>)> {
    let path = path.as_ref();
    let comma = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let content = fs::read_to_string(path)?;
    parse_points(&content, comma, input_dim)
}

fn parse_points(content: &str, comma: bool, input_dim: usize) -> Result<(Array2<f32>, Vec<String>)> {
    let mut features = Vec::new();
    let mut labels = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = index + 1;

        let tokens: Vec<&str> = if comma {
            line.split(',').map(str::trim).collect()
        } else {
            line.split_whitespace().collect()
        };

        if tokens.len() != input_dim + 1 {
            // A row of exactly the declared width that parses clean is a
            // feature row whose label column is missing.
            if tokens.len() == input_dim && tokens.iter().all(|t| t.parse::<f32>().is_ok()) {
                return Err(EngineErr::MissingLabel { line: lineno });
            }
            return Err(EngineErr::DimensionMismatch {
                got: tokens.len().saturating_sub(1),
                expected: input_dim,
            });
        }

        for (column, token) in tokens[..input_dim].iter().enumerate() {
            let value: f32 = token.parse().map_err(|_| EngineErr::NonNumericData {
                line: lineno,
                column: column + 1,
            })?;
            features.push(value);
        }
        labels.push(tokens[input_dim].to_string());
    }

    let samples = labels.len();
    let points = Array2::from_shape_vec((samples, input_dim), features)
        .expect("row-major feature buffer matches the sample count")
        .reversed_axes();

    Ok((points, labels))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_whitespace_separated_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "points.txt", "0 0 a\n1 0 b\n0 1 a\n1 1 b\n");

        let (points, labels) = load_points_file(&path, 2).unwrap();

        assert_eq!(points.shape(), [2, 4]);
        assert_eq!(points.row(0), ndarray::array![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(labels, ["a", "b", "a", "b"]);
    }

    #[test]
    fn loads_comma_separated_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "points.csv", "0.5, 1.5, first\n2.5, 3.5, second\n");

        let (points, labels) = load_points_file(&path, 2).unwrap();

        assert_eq!(points[[1, 1]], 3.5);
        assert_eq!(labels, ["first", "second"]);
    }

    #[test]
    fn skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "points.txt", "\n1 2 x\n\n3 4 y\n\n");

        let (points, _) = load_points_file(&path, 2).unwrap();
        assert_eq!(points.ncols(), 2);
    }

    #[test]
    fn reports_a_missing_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "points.txt", "1 2 x\n3 4\n");

        let err = load_points_file(&path, 2).unwrap_err();
        assert!(matches!(err, EngineErr::MissingLabel { line: 2 }));
    }

    #[test]
    fn reports_non_numeric_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "points.txt", "1 oops x\n");

        let err = load_points_file(&path, 2).unwrap_err();
        assert!(matches!(err, EngineErr::NonNumericData { line: 1, column: 2 }));
    }

    #[test]
    fn reports_a_feature_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "points.txt", "1 2 3 x\n");

        let err = load_points_file(&path, 2).unwrap_err();
        assert!(matches!(err, EngineErr::DimensionMismatch { got: 3, expected: 2 }));
    }
}
