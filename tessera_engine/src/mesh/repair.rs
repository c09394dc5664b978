// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::mesh::halfedge::validation::validate_topology;
use crate::prelude::*;

pub mod degenerate_faces;
pub mod duplicate_faces;
pub mod hole_filler;
pub mod isolated_vertices;
pub mod non_manifold_edges;
pub mod normal_unifier;

pub use degenerate_faces::RemoveDegenerateFaces;
pub use duplicate_faces::RemoveDuplicateFaces;
pub use hole_filler::FillHoles;
pub use isolated_vertices::RemoveIsolatedVertices;
pub use non_manifold_edges::{NonManifoldStrategy, RepairNonManifoldEdges};
pub use normal_unifier::UnifyNormals;

/// Iteration guard for the flood / clipping loops inside the repair
/// operations, bounding worst-case behavior on pathological inputs.
pub const REPAIR_LOOP_CAP: usize = 10000;

/// Options for the repair pipeline. Everything has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairOptions {
    /// How to resolve edges with more than two incident faces.
    pub non_manifold_strategy: NonManifoldStrategy,
    /// Boundary loops longer than this are left open.
    pub max_hole_size: usize,
    /// Triangles below this area count as degenerate.
    pub degenerate_area_threshold: f32,
    /// Run the topology validator after every step; a failure downgrades the
    /// report but does not abort the pipeline.
    pub validate_after_each_step: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            non_manifold_strategy: NonManifoldStrategy::Auto,
            max_hole_size: 100,
            degenerate_area_threshold: 1e-10,
            validate_after_each_step: false,
        }
    }
}

/// Per-operation outcome row.
#[derive(Debug, Clone)]
pub struct RepairStats {
    pub operation: &'static str,
    pub found: usize,
    pub fixed: usize,
    pub elapsed: Duration,
    pub success: bool,
    pub reason: Option<String>,
}

/// The common surface of every repair operation: count defects, fix them,
/// or do both and report.
pub trait RepairOp {
    fn name(&self) -> &'static str;

    /// Counts defects without touching the mesh.
    fn detect(&self, mesh: &MeshConnectivity) -> usize;

    /// Fixes whatever [`RepairOp::detect`] counts; returns how many defects
    /// were fixed.
    fn repair(&self, mesh: &mut MeshConnectivity) -> Result<usize>;

    /// Detect, repair, and time the whole thing into a stats row.
    fn execute(&self, mesh: &mut MeshConnectivity) -> RepairStats {
        let start = Instant::now();
        let found = self.detect(mesh);
        match self.repair(mesh) {
            Ok(fixed) => RepairStats {
                operation: self.name(),
                found,
                fixed,
                elapsed: start.elapsed(),
                success: true,
                reason: None,
            },
            Err(err) => RepairStats {
                operation: self.name(),
                found,
                fixed: 0,
                elapsed: start.elapsed(),
                success: false,
                reason: Some(format!("{err:#}")),
            },
        }
    }
}

/// Aggregated outcome of [`repair_all`].
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub steps: Vec<RepairStats>,
    pub success: bool,
    /// The reason of the first failing step, if any.
    pub reason: Option<String>,
}

impl RepairReport {
    pub fn total_found(&self) -> usize {
        self.steps.iter().map(|s| s.found).sum()
    }

    pub fn total_fixed(&self) -> usize {
        self.steps.iter().map(|s| s.fixed).sum()
    }
}

/// Runs the standard repair sequence in fixed order: isolated vertices,
/// duplicate faces, degenerate faces, holes, then normal unification.
/// Non-manifold edge repair is a standalone operation; run
/// [`RepairNonManifoldEdges`] explicitly when you want it.
#[profiling::function]
pub fn repair_all(mesh: &mut MeshConnectivity, options: &RepairOptions) -> RepairReport {
    let ops: Vec<Box<dyn RepairOp>> = vec![
        Box::new(RemoveIsolatedVertices),
        Box::new(RemoveDuplicateFaces),
        Box::new(RemoveDegenerateFaces {
            area_threshold: options.degenerate_area_threshold,
        }),
        Box::new(FillHoles {
            max_hole_size: options.max_hole_size,
        }),
        Box::new(UnifyNormals),
    ];

    let mut report = RepairReport {
        success: true,
        ..Default::default()
    };

    for op in ops {
        let mut stats = op.execute(mesh);
        log::debug!(
            "repair {}: found {}, fixed {} in {:?}",
            stats.operation,
            stats.found,
            stats.fixed,
            stats.elapsed
        );

        if options.validate_after_each_step && stats.success {
            let validation = validate_topology(mesh);
            if !validation.is_valid() {
                stats.success = false;
                stats.reason = Some(format!(
                    "validation after {} failed: {} errors",
                    stats.operation,
                    validation.errors.len()
                ));
            }
        }

        if !stats.success && report.reason.is_none() {
            report.reason = stats.reason.clone();
        }
        report.success &= stats.success;
        report.steps.push(stats);
    }

    report
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repair_all_is_idempotent() {
        // An octahedron missing its top face (a triangular hole), with one
        // face duplicated and an isolated vertex thrown in
        let positions = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(9.0, 9.0, 9.0), // isolated
        ];
        let indices = [
            4, 2, 1, 4, 1, 3, 4, 3, 0, //
            5, 2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3, //
            5, 2, 0, // duplicate
        ];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();

        let options = RepairOptions {
            validate_after_each_step: true,
            ..Default::default()
        };
        let first = repair_all(&mut mesh, &options);
        assert!(first.success, "first pass failed: {:?}", first.reason);
        assert!(first.total_fixed() >= 3); // vertex + duplicate + hole
        assert!(validate_topology(&mesh).is_valid());

        // The hole is closed, so the surface is a full octahedron again
        let stats = mesh.stats();
        assert_eq!(stats.faces, 8);
        assert_eq!(stats.boundary_edges, 0);
        assert_eq!(stats.euler_characteristic, 2);

        let second = repair_all(&mut mesh, &options);
        assert!(second.success);
        assert_eq!(second.total_found(), 0);
        assert_eq!(second.total_fixed(), 0);
    }
}
