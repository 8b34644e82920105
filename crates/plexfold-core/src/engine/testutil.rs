//! Shared fixtures for engine tests.

use nalgebra::Point3;

use crate::core::models::restraints::DistanceRestraint;
use crate::core::models::slots::SlotTable;
use crate::core::models::subunit::SubunitType;
use crate::core::models::ComplexDefinition;

use super::assembly::ComposeContext;
use super::config::{FoldParams, StaticParams};
use super::grid::SpatialGrid;
use super::restraints::RestraintTable;

/// A 12-point two-layer cloud, ~5 Å across, nothing collinear.
pub(crate) fn compact_cloud() -> Vec<Point3<f64>> {
    let mut points = Vec::new();
    for layer in 0..2 {
        for row in 0..2 {
            for col in 0..3 {
                points.push(Point3::new(
                    2.0 * col as f64,
                    2.0 * row as f64 + 0.3 * col as f64,
                    2.5 * layer as f64,
                ));
            }
        }
    }
    points
}

pub(crate) fn compact_subunit(name: &str) -> SubunitType {
    SubunitType::new(name, (1..=12).collect(), compact_cloud(), vec![90.0; 12]).unwrap()
}

/// Owned bundle of everything a [`ComposeContext`] borrows.
pub(crate) struct Fixture {
    pub def: ComplexDefinition,
    pub grids: Vec<SpatialGrid>,
    pub restraints: RestraintTable,
    pub params: FoldParams,
    pub statics: StaticParams,
    pub admitted: Vec<usize>,
}

impl Fixture {
    /// Two copies of one compact, non-collinear subunit.
    pub fn homodimer() -> Self {
        Self::from_parts(vec![compact_subunit("A")], &[(0, 0), (0, 0)], &[])
    }

    pub fn from_parts(
        subunits: Vec<SubunitType>,
        assignments: &[(usize, u8)],
        restraint_defs: &[DistanceRestraint],
    ) -> Self {
        let def = ComplexDefinition {
            subunits,
            slots: SlotTable::new(assignments).unwrap(),
        };
        let params = FoldParams::new(10, 10);
        let statics = StaticParams::default();
        let grids = def
            .subunits
            .iter()
            .map(|su| SpatialGrid::build(su, statics.grid_resolution, statics.grid_margins))
            .collect();
        let admitted = def
            .subunits
            .iter()
            .map(|su| su.admitted_count(params.min_temperature_to_consider_collision))
            .collect();
        let restraints =
            RestraintTable::resolve(restraint_defs, &def, params.restraints_ratio).unwrap();
        Self {
            def,
            grids,
            restraints,
            params,
            statics,
            admitted,
        }
    }

    pub fn ctx(&self) -> ComposeContext<'_> {
        ComposeContext {
            def: &self.def,
            grids: &self.grids,
            restraints: &self.restraints,
            params: &self.params,
            statics: &self.statics,
            admitted: &self.admitted,
        }
    }
}
