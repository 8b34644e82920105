use thiserror::Error;

use crate::core::geometry::GeometryError;

/// Fatal engine failures, surfaced to the caller.
///
/// Per-candidate search failures are *not* errors; they are [`Rejection`]
/// values counted by the folder.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("restraint site does not resolve: {0}")]
    UnresolvedSite(String),

    #[error("restraints cannot be satisfied: {0}")]
    Unsatisfiable(String),

    #[error("no complete assembly survived the search")]
    NoAssembly,

    #[error("internal logic error: {0}")]
    Internal(String),
}

/// Why a candidate composition was discarded.
///
/// Silent at the data layer; the folder aggregates these into
/// [`super::folder::FoldStats`] for the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The two parts already share a chain slot.
    IncompatibleOverlap,
    /// Two copies of one subunit type landed on the same position.
    DuplicatePlacement,
    /// A chain's backbone collision ratio crossed the policy limit.
    CollisionLimitExceeded,
    /// A placed pair overlapped deeper than the penetration threshold.
    PenetrationExceeded,
    /// The violated-weight ratio of decided restraints crossed the limit.
    ConstraintViolation,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rejection::IncompatibleOverlap => "incompatible overlap",
            Rejection::DuplicatePlacement => "duplicate placement",
            Rejection::CollisionLimitExceeded => "collision limit exceeded",
            Rejection::PenetrationExceeded => "penetration exceeded",
            Rejection::ConstraintViolation => "constraint violation",
        };
        f.write_str(name)
    }
}
