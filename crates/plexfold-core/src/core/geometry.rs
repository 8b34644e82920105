use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("superposition requires at least 3 points, but found {found}")]
    InsufficientPoints { found: usize },

    #[error("superposition input is degenerate (collinear or coincident points)")]
    DegenerateInput,

    #[error("point sets differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// A rigid body motion applied as `p -> R p + t`.
///
/// The rotation is kept as a plain 3x3 matrix; Euler angles exist only on
/// the wire (see [`RigidTransform::from_wire`] and [`RigidTransform::to_wire`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl RigidTransform {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// `self ∘ rhs`: the motion that applies `rhs` first, then `self`.
    pub fn compose(&self, rhs: &Self) -> Self {
        Self {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation * rhs.translation + self.translation,
        }
    }

    pub fn inverse(&self) -> Self {
        let rt = self.rotation.transpose();
        Self {
            rotation: rt,
            translation: -(rt * self.translation),
        }
    }

    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    pub fn apply_to_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// Builds a transform from its wire representation: X→Y→Z intrinsic
    /// Euler angles in radians followed by the translation in Å.
    pub fn from_wire(rx: f64, ry: f64, rz: f64, tx: f64, ty: f64, tz: f64) -> Self {
        let (sa, ca) = rx.sin_cos();
        let (sb, cb) = ry.sin_cos();
        let (sc, cc) = rz.sin_cos();

        // R = Rx(rx) * Ry(ry) * Rz(rz)
        let rotation = Matrix3::new(
            cb * cc,
            -cb * sc,
            sb,
            ca * sc + sa * sb * cc,
            ca * cc - sa * sb * sc,
            -sa * cb,
            sa * sc - ca * sb * cc,
            sa * cc + ca * sb * sc,
            ca * cb,
        );
        Self {
            rotation,
            translation: Vector3::new(tx, ty, tz),
        }
    }

    /// Serializes to `[rx, ry, rz, tx, ty, tz]`, inverting [`Self::from_wire`].
    pub fn to_wire(&self) -> [f64; 6] {
        let m = &self.rotation;
        let sy = m[(0, 2)].clamp(-1.0, 1.0);

        let (rx, ry, rz) = if sy.abs() < 1.0 - 1e-12 {
            (
                (-m[(1, 2)]).atan2(m[(2, 2)]),
                sy.asin(),
                (-m[(0, 1)]).atan2(m[(0, 0)]),
            )
        } else {
            // Gimbal lock: rz is absorbed into rx.
            (
                (sy * m[(1, 0)]).atan2(m[(1, 1)]),
                std::f64::consts::FRAC_PI_2 * sy.signum(),
                0.0,
            )
        };

        [
            rx,
            ry,
            rz,
            self.translation.x,
            self.translation.y,
            self.translation.z,
        ]
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Root-mean-square distance between `a` and `T(b)`, paired by index.
pub fn rmsd(a: &[Point3<f64>], b: &[Point3<f64>], t: &RigidTransform) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(pa, pb)| (pa - t.apply(pb)).norm_squared())
        .sum();
    (sum / a.len() as f64).sqrt()
}

/// Least-squares superposition: the rigid transform minimizing
/// `rmsd(a, b, T)`, via the SVD of the cross-covariance matrix with
/// determinant correction.
pub fn superpose(
    a: &[Point3<f64>],
    b: &[Point3<f64>],
) -> Result<RigidTransform, GeometryError> {
    if a.len() != b.len() {
        return Err(GeometryError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.len() < 3 {
        return Err(GeometryError::InsufficientPoints { found: a.len() });
    }

    let n = a.len() as f64;
    let a_centroid: Vector3<f64> = a.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n;
    let b_centroid: Vector3<f64> = b.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n;

    let h = a
        .iter()
        .zip(b.iter())
        .fold(Matrix3::zeros(), |acc, (pa, pb)| {
            acc + (pa.coords - a_centroid) * (pb.coords - b_centroid).transpose()
        });

    let svd = h.svd(true, true);
    // A collinear or coincident input collapses the second singular value.
    if svd.singular_values[1] < 1e-8 {
        return Err(GeometryError::DegenerateInput);
    }

    let u = svd.u.ok_or(GeometryError::DegenerateInput)?;
    let v_t = svd.v_t.ok_or(GeometryError::DegenerateInput)?;

    let d = (u * v_t.transpose()).determinant();
    let mut correction = Matrix3::identity();
    if d < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    let rotation = u * correction * v_t;
    let translation = a_centroid - rotation * b_centroid;

    Ok(RigidTransform::new(rotation, translation))
}
