use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubunitError {
    #[error("subunit '{name}' has no backbone points")]
    EmptyBackbone { name: String },

    #[error(
        "subunit '{name}' field lengths disagree: {residues} residues, {points} points, {confidence} confidence values"
    )]
    MismatchedLengths {
        name: String,
        residues: usize,
        points: usize,
        confidence: usize,
    },
}

/// One distinct protein-chain sequence, shared by all of its copies.
///
/// Carries the backbone point cloud (one representative atom per residue),
/// the per-point confidence field used to gate collidable atoms, and the
/// bounding sphere used to skip far-apart pair probes. Constructed once at
/// load and never mutated during search.
#[derive(Debug, Clone, PartialEq)]
pub struct SubunitType {
    name: String,
    residues: Vec<i32>,
    backbone: Vec<Point3<f64>>,
    confidence: Vec<f64>,
    centroid: Point3<f64>,
    radius: f64,
}

impl SubunitType {
    pub fn new(
        name: impl Into<String>,
        residues: Vec<i32>,
        backbone: Vec<Point3<f64>>,
        confidence: Vec<f64>,
    ) -> Result<Self, SubunitError> {
        let name = name.into();
        if backbone.is_empty() {
            return Err(SubunitError::EmptyBackbone { name });
        }
        if residues.len() != backbone.len() || confidence.len() != backbone.len() {
            return Err(SubunitError::MismatchedLengths {
                name,
                residues: residues.len(),
                points: backbone.len(),
                confidence: confidence.len(),
            });
        }

        let n = backbone.len() as f64;
        let centroid = Point3::from(
            backbone
                .iter()
                .map(|p| p.coords)
                .sum::<nalgebra::Vector3<f64>>()
                / n,
        );
        let radius = backbone
            .iter()
            .map(|p| (p - centroid).norm())
            .fold(0.0, f64::max);

        Ok(Self {
            name,
            residues,
            backbone,
            confidence,
            centroid,
            radius,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.backbone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backbone.is_empty()
    }

    pub fn residues(&self) -> &[i32] {
        &self.residues
    }

    pub fn backbone(&self) -> &[Point3<f64>] {
        &self.backbone
    }

    pub fn confidence(&self) -> &[f64] {
        &self.confidence
    }

    pub fn centroid(&self) -> Point3<f64> {
        self.centroid
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Index of a residue identifier in the backbone ordering.
    pub fn residue_index(&self, residue: i32) -> Option<usize> {
        self.residues.iter().position(|&r| r == residue)
    }

    pub fn n_terminal_residue(&self) -> i32 {
        self.residues[0]
    }

    pub fn c_terminal_residue(&self) -> i32 {
        self.residues[self.residues.len() - 1]
    }

    /// Number of points whose confidence passes the collision threshold.
    pub fn admitted_count(&self, threshold: f64) -> usize {
        self.confidence.iter().filter(|&&c| c >= threshold).count()
    }
}
