use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::core::models::restraints::DistanceRestraint;

#[derive(Debug, Error)]
pub enum RestraintFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: expected '<res1> <chain1> <res2> <chain2> <dMin> <dMax> <weight>'")]
    MalformedLine { line: usize },

    #[error("line {line}: invalid {field} '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: chain label '{value}' must be a single character")]
    InvalidChainLabel { line: usize, value: String },
}

/// Parses a restraints file: one distance restraint per line, blank lines
/// and `#` comments ignored.
pub fn load_restraints(path: &Path) -> Result<Vec<DistanceRestraint>, RestraintFileError> {
    let file = std::fs::File::open(path)?;
    let restraints = parse_restraints(&mut io::BufReader::new(file))?;
    info!(restraints = restraints.len(), "Restraints file loaded.");
    Ok(restraints)
}

pub fn parse_restraints(
    reader: &mut impl BufRead,
) -> Result<Vec<DistanceRestraint>, RestraintFileError> {
    let mut restraints = Vec::new();

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let [res1, chain1, res2, chain2, d_min, d_max, weight] = fields.as_slice() else {
            return Err(RestraintFileError::MalformedLine { line: line_num });
        };

        restraints.push(DistanceRestraint {
            res1: parse(res1, line_num, "residue")?,
            chain1: parse_label(chain1, line_num)?,
            res2: parse(res2, line_num, "residue")?,
            chain2: parse_label(chain2, line_num)?,
            d_min: parse(d_min, line_num, "distance")?,
            d_max: parse(d_max, line_num, "distance")?,
            weight: parse(weight, line_num, "weight")?,
        });
    }

    Ok(restraints)
}

fn parse<T: std::str::FromStr>(
    value: &str,
    line: usize,
    field: &'static str,
) -> Result<T, RestraintFileError> {
    value.parse().map_err(|_| RestraintFileError::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

fn parse_label(value: &str, line: usize) -> Result<char, RestraintFileError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(RestraintFileError::InvalidChainLabel {
            line,
            value: value.to_string(),
        }),
    }
}
