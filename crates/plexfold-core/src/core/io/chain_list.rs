use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::pdb::{self, PdbError};
use crate::core::models::slots::{SlotError, SlotTable};
use crate::core::models::subunit::{SubunitError, SubunitType};
use crate::core::models::ComplexDefinition;

#[derive(Debug, Error)]
pub enum ChainListError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: invalid group tag '{value}'")]
    InvalidGroup { line: usize, value: String },

    #[error("line {line}: group tag of '{path}' disagrees with an earlier copy")]
    InconsistentGroup { line: usize, path: String },

    #[error("failed to read subunit file '{path}': {source}", path = path.display())]
    Subunit {
        path: PathBuf,
        #[source]
        source: PdbError,
    },

    #[error(transparent)]
    Model(#[from] SubunitError),

    #[error(transparent)]
    Slots(#[from] SlotError),

    #[error("chain list is empty")]
    Empty,
}

/// Loads a `chain.list` file: one line per chain slot in global id order,
/// `<path-to-subunit-coordinates> [group]`.
///
/// Lines naming the same path define copies of one subunit type (the type
/// name is the file stem). Paths are resolved relative to the list's
/// directory. Blank lines and `#` comments are ignored.
pub fn load_chain_list(path: &Path) -> Result<ComplexDefinition, ChainListError> {
    let file = std::fs::File::open(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    load_from(&mut io::BufReader::new(file), base_dir)
}

pub fn load_from(
    reader: &mut impl BufRead,
    base_dir: &Path,
) -> Result<ComplexDefinition, ChainListError> {
    let mut subunits: Vec<SubunitType> = Vec::new();
    let mut loaded_paths: Vec<String> = Vec::new();
    let mut assignments: Vec<(usize, u8)> = Vec::new();
    let mut groups: Vec<u8> = Vec::new();

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let raw_path = parts.next().expect("non-empty line has a first token");
        let group: u8 = match parts.next() {
            Some(tag) => tag.parse().map_err(|_| ChainListError::InvalidGroup {
                line: line_num,
                value: tag.to_string(),
            })?,
            None => 0,
        };

        let type_index = match loaded_paths.iter().position(|p| p == raw_path) {
            Some(i) => {
                if groups[i] != group {
                    return Err(ChainListError::InconsistentGroup {
                        line: line_num,
                        path: raw_path.to_string(),
                    });
                }
                i
            }
            None => {
                let resolved = base_dir.join(raw_path);
                let backbone =
                    pdb::read_backbone_from_path(&resolved).map_err(|source| {
                        ChainListError::Subunit {
                            path: resolved.clone(),
                            source,
                        }
                    })?;
                let name = subunit_name(raw_path);
                debug!(
                    name,
                    residues = backbone.residues.len(),
                    "Loaded subunit coordinates."
                );
                subunits.push(SubunitType::new(
                    name,
                    backbone.residues,
                    backbone.points,
                    backbone.confidence,
                )?);
                loaded_paths.push(raw_path.to_string());
                groups.push(group);
                subunits.len() - 1
            }
        };

        assignments.push((type_index, group));
    }

    if assignments.is_empty() {
        return Err(ChainListError::Empty);
    }

    let slots = SlotTable::new(&assignments)?;
    info!(
        subunit_types = subunits.len(),
        chain_slots = slots.len(),
        "Chain list loaded."
    );

    Ok(ComplexDefinition { subunits, slots })
}

fn subunit_name(raw_path: &str) -> String {
    Path::new(raw_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| raw_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_subunit(dir: &Path, name: &str, n: usize) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        for i in 0..n {
            writeln!(
                file,
                "ATOM  {:>5}  CA  ALA A{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}           C",
                i + 1,
                i + 1,
                3.8 * i as f64,
                (i % 2) as f64,
                0.0,
                1.0,
                88.0
            )
            .unwrap();
        }
    }

    #[test]
    fn repeated_paths_become_copies_of_one_type() {
        let dir = TempDir::new().unwrap();
        write_subunit(dir.path(), "A.pdb", 5);
        write_subunit(dir.path(), "B.pdb", 4);
        std::fs::write(dir.path().join("chain.list"), "A.pdb\nA.pdb\nB.pdb\n").unwrap();

        let def = load_chain_list(&dir.path().join("chain.list")).unwrap();

        assert_eq!(def.subunits.len(), 2);
        assert_eq!(def.subunits[0].name(), "A");
        assert_eq!(def.subunits[1].name(), "B");
        assert_eq!(def.slots.len(), 3);
        assert_eq!(def.slots.slot(0).subunit, 0);
        assert_eq!(def.slots.slot(1).subunit, 0);
        assert_eq!(def.slots.slot(1).copy, 1);
        assert_eq!(def.slots.slot(2).subunit, 1);
        assert_eq!(def.slots.slot(2).label, '2');
    }

    #[test]
    fn group_tags_are_parsed_and_checked() {
        let dir = TempDir::new().unwrap();
        write_subunit(dir.path(), "A.pdb", 5);
        write_subunit(dir.path(), "B.pdb", 4);
        std::fs::write(dir.path().join("chain.list"), "A.pdb 0\nB.pdb 1\n").unwrap();

        let def = load_chain_list(&dir.path().join("chain.list")).unwrap();
        assert!(def.slots.groups_configured());
        assert_eq!(def.slots.slot(1).group, 1);
    }

    #[test]
    fn inconsistent_group_for_same_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_subunit(dir.path(), "A.pdb", 5);
        std::fs::write(dir.path().join("chain.list"), "A.pdb 0\nA.pdb 1\n").unwrap();

        let result = load_chain_list(&dir.path().join("chain.list"));
        assert!(matches!(
            result,
            Err(ChainListError::InconsistentGroup { line: 2, .. })
        ));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_subunit(dir.path(), "A.pdb", 5);
        std::fs::write(
            dir.path().join("chain.list"),
            "# the complex\n\nA.pdb\n  # trailing comment line\n",
        )
        .unwrap();

        let def = load_chain_list(&dir.path().join("chain.list")).unwrap();
        assert_eq!(def.slots.len(), 1);
    }

    #[test]
    fn missing_subunit_file_is_reported_with_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("chain.list"), "missing.pdb\n").unwrap();

        let result = load_chain_list(&dir.path().join("chain.list"));
        assert!(matches!(result, Err(ChainListError::Subunit { .. })));
    }

    #[test]
    fn empty_list_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("chain.list"), "# nothing\n").unwrap();

        assert!(matches!(
            load_chain_list(&dir.path().join("chain.list")),
            Err(ChainListError::Empty)
        ));
    }

    #[test]
    fn invalid_group_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_subunit(dir.path(), "A.pdb", 5);
        std::fs::write(dir.path().join("chain.list"), "A.pdb one\n").unwrap();

        assert!(matches!(
            load_chain_list(&dir.path().join("chain.list")),
            Err(ChainListError::InvalidGroup { line: 1, .. })
        ));
    }
}
