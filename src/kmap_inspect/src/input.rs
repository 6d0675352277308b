//! Coordinate file reader.
//!
//! One coordinate per line, integers separated by whitespace or commas.
//! `#` starts a comment; blank lines are skipped.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sparse_coords::CoordinateBatch;

pub fn load_coordinates(path: &Path) -> Result<CoordinateBatch<i64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read coordinate file {}", path.display()))?;
    parse_coordinates(&text).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_coordinates(text: &str) -> Result<CoordinateBatch<i64>> {
    let mut data = Vec::new();
    let mut width = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let values = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<i64>()
                    .with_context(|| format!("line {}: invalid integer {token:?}", line_no + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        match width {
            None => width = Some(values.len()),
            Some(w) if w != values.len() => bail!(
                "line {}: expected {w} components, found {}",
                line_no + 1,
                values.len()
            ),
            Some(_) => {}
        }
        data.extend(values);
    }

    let Some(width) = width else {
        bail!("no coordinates found");
    };
    Ok(CoordinateBatch::from_flat(data, width)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_separators() {
        let text = "# batch x y\n0, 1, 2\n0 3 4  # trailing\n\n1,\t-5,6\n";
        let batch = parse_coordinates(text).unwrap();
        assert_eq!(batch.width(), 3);
        assert_eq!(batch.as_flat(), &[0, 1, 2, 0, 3, 4, 1, -5, 6]);
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        let err = parse_coordinates("1 2 3\n4 5\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_coordinates("1 x 3\n").is_err());
        assert!(parse_coordinates("# only comments\n").is_err());
    }
}
