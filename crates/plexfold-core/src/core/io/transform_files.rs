use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::geometry::RigidTransform;
use crate::core::models::transforms::{PairTransform, TransformLibrary};
use crate::core::models::ComplexDefinition;

#[derive(Debug, Error)]
pub enum TransformFileError {
    #[error("I/O error reading '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: expected '<rank> | <score> | <provenance> | <6 floats>'", path = path.display())]
    MalformedLine { path: PathBuf, line: usize },

    #[error("{path}:{line}: invalid number '{value}'", path = path.display())]
    InvalidNumber {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{path}:{line}: score {score} is outside [0, 100]", path = path.display())]
    ScoreOutOfRange {
        path: PathBuf,
        line: usize,
        score: f64,
    },
}

/// Loads the transform pool for every unordered subunit-type pair.
///
/// For the pair `{A, B}` the file `<prefix><A>_plus_<B>` is read (either
/// orientation of the name is accepted; the transforms live in the frame
/// of the type named on the left). A missing file leaves the pair's entry
/// empty. Each entry is score-sorted and capped at `cap_per_pair`.
pub fn load_transform_library(
    prefix: &str,
    def: &ComplexDefinition,
    cap_per_pair: usize,
) -> Result<TransformLibrary, TransformFileError> {
    let mut pool = Vec::new();
    let n = def.subunits.len();

    for a in 0..n {
        for b in a..n {
            let name_a = def.subunits[a].name();
            let name_b = def.subunits[b].name();
            let mut candidates = vec![(
                PathBuf::from(format!("{}{}_plus_{}", prefix, name_a, name_b)),
                a,
                b,
            )];
            if a != b {
                candidates.push((
                    PathBuf::from(format!("{}{}_plus_{}", prefix, name_b, name_a)),
                    b,
                    a,
                ));
            }

            let Some((path, from, to)) =
                candidates.into_iter().find(|(p, _, _)| p.is_file())
            else {
                debug!(pair = format!("{}:{}", name_a, name_b), "No transform file.");
                continue;
            };

            let count = read_pair_file(&path, from, to, &mut pool)?;
            debug!(
                file = %path.display(),
                transforms = count,
                "Loaded pair transforms."
            );
        }
    }

    if pool.is_empty() {
        warn!(prefix, "No pair transforms were found for any subunit pair.");
    } else {
        info!(transforms = pool.len(), "Transform pool loaded.");
    }

    Ok(TransformLibrary::from_pairs(pool, cap_per_pair))
}

fn read_pair_file(
    path: &Path,
    from_type: usize,
    to_type: usize,
    pool: &mut Vec<PairTransform>,
) -> Result<usize, TransformFileError> {
    let file = std::fs::File::open(path).map_err(|source| TransformFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut count = 0;
    for (line_num, line_res) in io::BufReader::new(file).lines().enumerate() {
        let line = line_res.map_err(|source| TransformFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let line_num = line_num + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        pool.push(parse_line(trimmed, path, line_num, from_type, to_type)?);
        count += 1;
    }
    Ok(count)
}

fn parse_line(
    line: &str,
    path: &Path,
    line_num: usize,
    from_type: usize,
    to_type: usize,
) -> Result<PairTransform, TransformFileError> {
    let malformed = || TransformFileError::MalformedLine {
        path: path.to_path_buf(),
        line: line_num,
    };

    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    let [_rank, score, provenance, params] = fields.as_slice() else {
        return Err(malformed());
    };

    let score: f64 = parse_number(score, path, line_num)?;
    if !(0.0..=100.0).contains(&score) {
        return Err(TransformFileError::ScoreOutOfRange {
            path: path.to_path_buf(),
            line: line_num,
            score,
        });
    }

    let values: Vec<f64> = params
        .split_whitespace()
        .map(|v| parse_number(v, path, line_num))
        .collect::<Result<_, _>>()?;
    let [rx, ry, rz, tx, ty, tz] = values.as_slice() else {
        return Err(malformed());
    };

    Ok(PairTransform {
        from_type,
        to_type,
        transform: RigidTransform::from_wire(*rx, *ry, *rz, *tx, *ty, *tz),
        score,
        provenance: provenance.to_string(),
    })
}

fn parse_number(value: &str, path: &Path, line_num: usize) -> Result<f64, TransformFileError> {
    value.parse().map_err(|_| TransformFileError::InvalidNumber {
        path: path.to_path_buf(),
        line: line_num,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::slots::SlotTable;
    use crate::core::models::subunit::SubunitType;
    use nalgebra::{Point3, Vector3};
    use tempfile::TempDir;

    fn definition(names: &[&str]) -> ComplexDefinition {
        let subunits: Vec<SubunitType> = names
            .iter()
            .map(|name| {
                SubunitType::new(
                    *name,
                    vec![1, 2, 3],
                    vec![
                        Point3::origin(),
                        Point3::new(3.8, 0.0, 0.0),
                        Point3::new(3.8, 3.8, 0.0),
                    ],
                    vec![90.0; 3],
                )
                .unwrap()
            })
            .collect();
        let assignments: Vec<(usize, u8)> = (0..subunits.len()).map(|i| (i, 0)).collect();
        ComplexDefinition {
            subunits,
            slots: SlotTable::new(&assignments).unwrap(),
        }
    }

    #[test]
    fn loads_and_sorts_a_pair_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("A_plus_B"),
            "# rank | score | source | transform\n\
             1 | 60.5 | afm_model_3 | 0 0 0 0 0 10\n\
             2 | 91.0 | afm_model_1 | 0.1 -0.2 0.3 1 2 3\n",
        )
        .unwrap();

        let prefix = format!("{}/", dir.path().display());
        let lib = load_transform_library(&prefix, &definition(&["A", "B"]), 100).unwrap();

        let entries: Vec<(RigidTransform, f64)> = lib.transforms_between(0, 1).collect();
        assert_eq!(entries.len(), 2);
        assert!((entries[0].1 - 91.0).abs() < 1e-9);
        assert!((entries[0].0.translation - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
    }

    #[test]
    fn reversed_filename_orientation_is_accepted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("B_plus_A"),
            "1 | 50.0 | m | 0 0 0 0 0 10\n",
        )
        .unwrap();

        let prefix = format!("{}/", dir.path().display());
        let lib = load_transform_library(&prefix, &definition(&["A", "B"]), 100).unwrap();

        // Stored as B->A; querying A->B must invert.
        let (t, _) = lib.transforms_between(0, 1).next().unwrap();
        assert!((t.translation - Vector3::new(0.0, 0.0, -10.0)).norm() < 1e-9);
    }

    #[test]
    fn missing_files_leave_entries_empty() {
        let dir = TempDir::new().unwrap();
        let prefix = format!("{}/", dir.path().display());
        let lib = load_transform_library(&prefix, &definition(&["A", "B"]), 100).unwrap();
        assert!(lib.is_empty());
    }

    #[test]
    fn cap_applies_per_pair() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("A_plus_B"),
            "1 | 90 | a | 0 0 0 0 0 10\n2 | 80 | b | 0 0 0 0 0 20\n3 | 70 | c | 0 0 0 0 0 30\n",
        )
        .unwrap();

        let prefix = format!("{}/", dir.path().display());
        let lib = load_transform_library(&prefix, &definition(&["A", "B"]), 2).unwrap();
        assert_eq!(lib.entry_len(0, 1), 2);
    }

    #[test]
    fn malformed_line_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A_plus_B"), "1 | 90 | only_three_fields\n").unwrap();

        let prefix = format!("{}/", dir.path().display());
        let result = load_transform_library(&prefix, &definition(&["A", "B"]), 100);
        assert!(matches!(
            result,
            Err(TransformFileError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("A_plus_B"),
            "1 | 140.0 | m | 0 0 0 0 0 10\n",
        )
        .unwrap();

        let prefix = format!("{}/", dir.path().display());
        let result = load_transform_library(&prefix, &definition(&["A", "B"]), 100);
        assert!(matches!(
            result,
            Err(TransformFileError::ScoreOutOfRange { score, .. }) if score == 140.0
        ));
    }

    #[test]
    fn same_type_pair_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A_plus_A"), "1 | 88 | m | 0 0 0 0 0 15\n").unwrap();

        let prefix = format!("{}/", dir.path().display());
        let lib = load_transform_library(&prefix, &definition(&["A"]), 100).unwrap();
        assert!(lib.has_entry(0, 0));
    }
}
