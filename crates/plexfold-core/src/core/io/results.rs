use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use crate::core::models::slots::SlotId;

/// One emitted assembly: per-slot wire transforms plus its scores.
///
/// Line format:
/// `[<slot>(rx ry rz tx ty tz), ...] weightedTransScore <v> numTrans <n>`
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRecord {
    pub placements: Vec<(SlotId, [f64; 6])>,
    pub weighted_trans_score: f64,
    pub num_trans: usize,
}

impl fmt::Display for AssemblyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (slot, w)) in self.placements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}({:.6} {:.6} {:.6} {:.6} {:.6} {:.6})",
                slot, w[0], w[1], w[2], w[3], w[4], w[5]
            )?;
        }
        write!(
            f,
            "] weightedTransScore {:.4} numTrans {}",
            self.weighted_trans_score, self.num_trans
        )
    }
}

/// Writes assembly records, one per line, in the given order.
pub fn write_results<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a AssemblyRecord>,
) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    for record in records {
        writeln!(file, "{}", record)?;
    }
    file.flush()
}
