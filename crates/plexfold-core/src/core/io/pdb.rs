use nalgebra::Point3;
use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: ATOM record is too short ({length} columns)")]
    TruncatedRecord { line: usize, length: usize },

    #[error("line {line}: invalid {field}: '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("no backbone atoms found")]
    NoAtoms,
}

/// Backbone extracted from one subunit coordinate file: one representative
/// point per residue, in file order, with its confidence (B-factor column).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBackbone {
    pub residues: Vec<i32>,
    pub points: Vec<Point3<f64>>,
    pub confidence: Vec<f64>,
}

struct PendingResidue {
    residue: i32,
    point: Point3<f64>,
    confidence: f64,
    is_ca: bool,
}

/// Reads the backbone of a PDB-format subunit file.
///
/// The representative atom per residue is `CA`, falling back to the first
/// atom of the residue when no `CA` is present. The B-factor column is
/// taken as the per-point confidence (pLDDT-style, 0-100); a missing
/// column defaults to fully confident.
pub fn read_backbone(reader: &mut impl BufRead) -> Result<ParsedBackbone, PdbError> {
    let mut parsed = ParsedBackbone {
        residues: Vec::new(),
        points: Vec::new(),
        confidence: Vec::new(),
    };
    let mut pending: Option<PendingResidue> = None;

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;
        if !line.starts_with("ATOM") {
            continue;
        }
        if line.len() < 54 {
            return Err(PdbError::TruncatedRecord {
                line: line_num,
                length: line.len(),
            });
        }

        let name = line.get(12..16).unwrap_or("").trim();
        let residue: i32 = parse_field(&line, 22..26, line_num, "residue number")?;
        let x: f64 = parse_field(&line, 30..38, line_num, "x coordinate")?;
        let y: f64 = parse_field(&line, 38..46, line_num, "y coordinate")?;
        let z: f64 = parse_field(&line, 46..54, line_num, "z coordinate")?;
        let confidence: f64 = if line.len() >= 66 {
            parse_field(&line, 60..66, line_num, "B-factor")?
        } else {
            100.0
        };

        let is_ca = name == "CA";
        match pending.as_mut() {
            Some(p) if p.residue == residue => {
                if is_ca && !p.is_ca {
                    p.point = Point3::new(x, y, z);
                    p.confidence = confidence;
                    p.is_ca = true;
                }
            }
            _ => {
                if let Some(p) = pending.take() {
                    parsed.residues.push(p.residue);
                    parsed.points.push(p.point);
                    parsed.confidence.push(p.confidence);
                }
                pending = Some(PendingResidue {
                    residue,
                    point: Point3::new(x, y, z),
                    confidence,
                    is_ca,
                });
            }
        }
    }

    if let Some(p) = pending {
        parsed.residues.push(p.residue);
        parsed.points.push(p.point);
        parsed.confidence.push(p.confidence);
    }

    if parsed.points.is_empty() {
        return Err(PdbError::NoAtoms);
    }
    Ok(parsed)
}

pub fn read_backbone_from_path(path: &Path) -> Result<ParsedBackbone, PdbError> {
    let file = std::fs::File::open(path)?;
    read_backbone(&mut io::BufReader::new(file))
}

fn parse_field<T: std::str::FromStr>(
    line: &str,
    range: std::ops::Range<usize>,
    line_num: usize,
    field: &'static str,
) -> Result<T, PdbError> {
    let raw = line
        .get(range)
        .ok_or(PdbError::TruncatedRecord {
            line: line_num,
            length: line.len(),
        })?
        .trim();
    raw.parse().map_err(|_| PdbError::InvalidField {
        line: line_num,
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn atom_line(serial: usize, name: &str, res: i32, x: f64, y: f64, z: f64, b: f64) -> String {
        format!(
            "ATOM  {:>5} {:<4} ALA A{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}           C",
            serial, name, res, x, y, z, 1.0, b
        )
    }

    fn read(content: &str) -> Result<ParsedBackbone, PdbError> {
        read_backbone(&mut BufReader::new(content.as_bytes()))
    }

    #[test]
    fn reads_one_ca_per_residue() {
        let content = [
            atom_line(1, "N", 1, 0.0, 0.0, 0.0, 80.0),
            atom_line(2, "CA", 1, 1.0, 0.0, 0.0, 85.0),
            atom_line(3, "C", 1, 2.0, 0.0, 0.0, 80.0),
            atom_line(4, "CA", 2, 4.0, 0.0, 0.0, 60.0),
        ]
        .join("\n");

        let parsed = read(&content).unwrap();
        assert_eq!(parsed.residues, vec![1, 2]);
        assert!((parsed.points[0] - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((parsed.confidence[0] - 85.0).abs() < 1e-9);
        assert!((parsed.confidence[1] - 60.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_first_atom_without_ca() {
        let content = [
            atom_line(1, "P", 1, 3.0, 1.0, 0.0, 70.0),
            atom_line(2, "O5'", 1, 4.0, 1.0, 0.0, 75.0),
        ]
        .join("\n");

        let parsed = read(&content).unwrap();
        assert_eq!(parsed.residues, vec![1]);
        assert!((parsed.points[0] - Point3::new(3.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn skips_non_atom_records() {
        let content = format!(
            "HEADER    TEST\nREMARK  1\n{}\nTER\nEND",
            atom_line(1, "CA", 5, 1.0, 2.0, 3.0, 90.0)
        );

        let parsed = read(&content).unwrap();
        assert_eq!(parsed.residues, vec![5]);
    }

    #[test]
    fn rejects_truncated_atom_record() {
        let result = read("ATOM      1  CA  ALA A   1");
        assert!(matches!(result, Err(PdbError::TruncatedRecord { line: 1, .. })));
    }

    #[test]
    fn rejects_unparsable_coordinate() {
        let mut line = atom_line(1, "CA", 1, 0.0, 0.0, 0.0, 90.0);
        line.replace_range(30..38, "  xx.xxx");
        let result = read(&line);
        assert!(matches!(
            result,
            Err(PdbError::InvalidField { field: "x coordinate", .. })
        ));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(read("REMARK nothing here"), Err(PdbError::NoAtoms)));
    }
}
