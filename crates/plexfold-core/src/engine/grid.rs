use nalgebra::Point3;
use std::collections::HashMap;

use crate::core::geometry::RigidTransform;
use crate::core::models::subunit::SubunitType;

/// Uniform 3-D bucket hash over one subunit's backbone points.
///
/// Keys are `(⌊x/r⌋, ⌊y/r⌋, ⌊z/r⌋)` with cell size `r = grid_resolution`;
/// the bounding box is extended by the grid margins for the cheap
/// outside-the-box early exit. Queries are pure reads and safe to run from
/// many threads at once.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    resolution: f64,
    margins: f64,
    points: Vec<Point3<f64>>,
    confidence: Vec<f64>,
    cells: HashMap<(i32, i32, i32), Vec<u32>>,
    bbox_min: Point3<f64>,
    bbox_max: Point3<f64>,
}

/// Result of one fused pair probe: hit flags live in the caller's masks,
/// the minimum admitted pair distance comes back here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairProbe {
    pub min_distance: f64,
}

impl SpatialGrid {
    pub fn build(subunit: &SubunitType, resolution: f64, margins: f64) -> Self {
        let points = subunit.backbone().to_vec();
        let confidence = subunit.confidence().to_vec();

        let mut bbox_min = points[0];
        let mut bbox_max = points[0];
        for p in &points {
            for axis in 0..3 {
                bbox_min[axis] = bbox_min[axis].min(p[axis]);
                bbox_max[axis] = bbox_max[axis].max(p[axis]);
            }
        }

        let mut cells: HashMap<(i32, i32, i32), Vec<u32>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            cells
                .entry(Self::cell_of(p, resolution))
                .or_default()
                .push(i as u32);
        }

        Self {
            resolution,
            margins,
            points,
            confidence,
            cells,
            bbox_min,
            bbox_max,
        }
    }

    fn cell_of(p: &Point3<f64>, resolution: f64) -> (i32, i32, i32) {
        (
            (p.x / resolution).floor() as i32,
            (p.y / resolution).floor() as i32,
            (p.z / resolution).floor() as i32,
        )
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Walks every admitted `(own, other)` point pair within `cutoff`,
    /// with `other` transformed into this grid's frame first.
    fn scan(
        &self,
        other: &SubunitType,
        t: &RigidTransform,
        confidence_threshold: f64,
        cutoff: f64,
        mut visit: impl FnMut(usize, usize, f64),
    ) {
        let pad = self.margins.max(cutoff);
        let span = (cutoff / self.resolution).ceil() as i32;

        for (j, (p, &conf)) in other
            .backbone()
            .iter()
            .zip(other.confidence().iter())
            .enumerate()
        {
            if conf < confidence_threshold {
                continue;
            }
            let q = t.apply(p);
            if q.x < self.bbox_min.x - pad
                || q.y < self.bbox_min.y - pad
                || q.z < self.bbox_min.z - pad
                || q.x > self.bbox_max.x + pad
                || q.y > self.bbox_max.y + pad
                || q.z > self.bbox_max.z + pad
            {
                continue;
            }

            let (cx, cy, cz) = Self::cell_of(&q, self.resolution);
            for dx in -span..=span {
                for dy in -span..=span {
                    for dz in -span..=span {
                        let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for &i in bucket {
                            let i = i as usize;
                            if self.confidence[i] < confidence_threshold {
                                continue;
                            }
                            let d = (self.points[i] - q).norm();
                            if d <= cutoff {
                                visit(i, j, d);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Backbone collision count: points of `other`, transformed into this
    /// grid's frame, that fall within one grid resolution of any admitted
    /// own point. Both sides must pass the confidence threshold.
    pub fn collision_count(
        &self,
        other: &SubunitType,
        t: &RigidTransform,
        confidence_threshold: f64,
    ) -> usize {
        let mut hit = vec![false; other.len()];
        self.scan(other, t, confidence_threshold, self.resolution, |_, j, _| {
            hit[j] = true;
        });
        hit.iter().filter(|&&h| h).count()
    }

    /// Maximum signed sphere overlap `2 * atom_radius - d` over admitted
    /// pairs; positive means overlap. `NEG_INFINITY` when no admitted pair
    /// comes within the probe window.
    pub fn max_penetration_depth(
        &self,
        other: &SubunitType,
        t: &RigidTransform,
        confidence_threshold: f64,
        atom_radius: f64,
    ) -> f64 {
        let cutoff = self.resolution.max(2.0 * atom_radius + self.margins);
        let mut min_distance = f64::INFINITY;
        self.scan(other, t, confidence_threshold, cutoff, |_, _, d| {
            min_distance = min_distance.min(d);
        });
        if min_distance.is_finite() {
            2.0 * atom_radius - min_distance
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Fused collision-and-penetration probe for one placed pair.
    ///
    /// Marks `own_hits[i]` / `other_hits[j]` for pairs within one grid
    /// resolution, and returns the minimum admitted pair distance within
    /// `cutoff`. Mask lengths must match the point counts.
    pub fn probe_pair(
        &self,
        other: &SubunitType,
        t: &RigidTransform,
        confidence_threshold: f64,
        cutoff: f64,
        own_hits: &mut [bool],
        other_hits: &mut [bool],
    ) -> PairProbe {
        debug_assert_eq!(own_hits.len(), self.points.len());
        debug_assert_eq!(other_hits.len(), other.len());

        let collide_r = self.resolution;
        let mut min_distance = f64::INFINITY;
        self.scan(
            other,
            t,
            confidence_threshold,
            cutoff.max(collide_r),
            |i, j, d| {
                if d <= collide_r {
                    own_hits[i] = true;
                    other_hits[j] = true;
                }
                min_distance = min_distance.min(d);
            },
        );

        PairProbe { min_distance }
    }
}
