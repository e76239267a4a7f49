//! Probe-sample file parser.
//!
//! One sample per row: `x y z`, whitespace separated. Columns past the third
//! are ignored. Blank rows and rows starting with `#` are skipped.

use crate::error::MapLoadError;
use crate::map::ProbeSample;

/// Round to one decimal place, ties to even.
#[inline]
pub fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}

/// Parse sample rows. X and Y are rounded to one decimal on ingest.
pub fn parse_samples(text: &str) -> Result<Vec<ProbeSample>, MapLoadError> {
    let mut samples = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let row = raw.trim();
        if row.is_empty() || row.starts_with('#') {
            continue;
        }

        let mut fields = row.split_whitespace();
        let mut xyz = [0.0f64; 3];
        for (col, slot) in xyz.iter_mut().enumerate() {
            let field = fields.next().ok_or_else(|| MapLoadError::Parse {
                line,
                reason: format!("expected 3 fields, found {col}"),
            })?;
            let value: f64 = field.parse().map_err(|_| MapLoadError::Parse {
                line,
                reason: format!("'{field}' is not a number"),
            })?;
            if !value.is_finite() {
                return Err(MapLoadError::Parse {
                    line,
                    reason: format!("'{field}' is not finite"),
                });
            }
            *slot = value;
        }

        samples.push(ProbeSample {
            x: round_tenth(xyz[0]),
            y: round_tenth(xyz[1]),
            z: xyz[2],
        });
    }

    if samples.is_empty() {
        return Err(MapLoadError::Empty);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_xy_but_not_z() {
        let samples = parse_samples("1.04 2.06 0.123456\n").unwrap();
        assert_eq!(samples[0].x, 1.0);
        assert_eq!(samples[0].y, 2.1);
        assert_eq!(samples[0].z, 0.123456);
    }

    #[test]
    fn round_tenth_ties_to_even() {
        assert_eq!(round_tenth(0.25), 0.2);
        assert_eq!(round_tenth(0.75), 0.8);
        assert_eq!(round_tenth(-1.25), -1.2);
    }

    #[test]
    fn skips_blank_and_comment_rows() {
        let text = "# probe run\n\n0 0 0.1\n   \n1 0 0.2\n";
        let samples = parse_samples(text).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn ignores_extra_columns() {
        let samples = parse_samples("0 0 0.5 99 extra\n").unwrap();
        assert_eq!(samples[0].z, 0.5);
    }

    #[test]
    fn short_row_reports_line() {
        let err = parse_samples("0 0 0\n1 1\n").unwrap_err();
        assert!(matches!(err, MapLoadError::Parse { line: 2, .. }));
    }

    #[test]
    fn non_numeric_field_reports_line() {
        let err = parse_samples("0 0 0\n1 abc 0\n").unwrap_err();
        match err {
            MapLoadError::Parse { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("abc"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_finite_rejected() {
        assert!(matches!(
            parse_samples("0 0 NaN\n"),
            Err(MapLoadError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            parse_samples("inf 0 0\n"),
            Err(MapLoadError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(parse_samples(""), Err(MapLoadError::Empty)));
        assert!(matches!(parse_samples("# only\n"), Err(MapLoadError::Empty)));
    }
}
