// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::mesh::halfedge::edit_ops::{
    collapse_edge, delaunay_pass, is_rejection, smooth_pass, split_edge,
};
use crate::prelude::*;

/// Mean-quality delta below which the loop is considered converged.
pub const CONVERGENCE_QUALITY_DELTA: f32 = 1e-3;

/// Options for the adaptive remeshing loop. All fields have defaults, so the
/// struct deserializes from partial configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemeshOptions {
    /// Target edge length. When unset, the bounding-box diagonal divided by
    /// the square root of the vertex count is used.
    pub target_edge_length: Option<f32>,
    /// Fraction of the target below which edges collapse.
    pub min_edge_length_ratio: f32,
    /// Fraction of the target above which edges split.
    pub max_edge_length_ratio: f32,
    /// Threshold used when counting low-quality triangles in the stats.
    pub min_triangle_quality: f32,
    /// Maximum number of iterations.
    pub iterations: usize,
    /// Blend factor for tangential smoothing, in 0..1.
    pub smoothing_damping: f32,
    /// Keep user-marked feature edges. When off, feature marks are dropped
    /// before the first iteration.
    pub preserve_features: bool,
    /// Vertex-index pairs to mark as features at import time.
    pub feature_edges: Vec<(u32, u32)>,
}

impl Default for RemeshOptions {
    fn default() -> Self {
        Self {
            target_edge_length: None,
            min_edge_length_ratio: 0.4,
            max_edge_length_ratio: 1.333,
            min_triangle_quality: 0.3,
            iterations: 5,
            smoothing_damping: 0.5,
            preserve_features: true,
            feature_edges: Vec::new(),
        }
    }
}

/// Aggregated counters over one remeshing run.
#[derive(Debug, Clone, Default)]
pub struct RemeshStats {
    pub iterations_run: usize,
    pub splits: usize,
    pub collapses: usize,
    pub flips: usize,
    pub smoothed: usize,
    pub rejected: usize,
    pub initial_quality: f32,
    pub final_quality: f32,
    /// Faces below `min_triangle_quality` when the loop stopped.
    pub low_quality_faces: usize,
    pub converged: bool,
}

/// The automatic target edge length: bounding-box diagonal over sqrt(|V|).
pub fn auto_target_edge_length(mesh: &MeshConnectivity) -> f32 {
    let (_, size) = mesh.bounding_box();
    let n = mesh.num_vertices().max(1) as f32;
    size.length() / n.sqrt()
}

/// Drives the mesh towards the target edge length: per iteration, split long
/// edges at their midpoint, collapse short ones, run a Delaunay flip pass,
/// then smooth tangentially once. Classification and the skeleton are
/// refreshed whenever splits or collapses change the topology. Individual
/// operator rejections are recorded, never fatal.
#[profiling::function]
pub fn remesh(mesh: &mut MeshConnectivity, options: &RemeshOptions) -> Result<RemeshStats> {
    if !options.preserve_features {
        mesh.clear_feature_marks();
    }

    let target = options
        .target_edge_length
        .unwrap_or_else(|| auto_target_edge_length(mesh));
    if !target.is_finite() || target <= 0.0 {
        bail!("remesh: target edge length {target} must be positive");
    }
    let split_above = target * options.max_edge_length_ratio;
    let collapse_below = target * options.min_edge_length_ratio;

    let mut stats = RemeshStats {
        initial_quality: mesh.mean_triangle_quality(),
        ..Default::default()
    };
    let mut previous_quality = stats.initial_quality;
    let mut skeleton = Skeleton::build(mesh);

    for iteration in 0..options.iterations {
        stats.iterations_run = iteration + 1;

        // 1. Split every edge longer than the upper bound at its midpoint.
        // Edges created by the splits themselves wait for the next iteration.
        let long_edges: Vec<EdgeId> = mesh
            .iter_edges()
            .filter(|(_, e)| e.length() > split_above)
            .map(|(id, _)| id)
            .collect();
        let mut splits = 0;
        for e in long_edges {
            if mesh.edge(e).map(|edge| edge.length() > split_above) != Some(true) {
                continue;
            }
            match split_edge(mesh, e, 0.5) {
                Ok(_) => splits += 1,
                Err(err) if is_rejection(&err) => stats.rejected += 1,
                Err(err) => {
                    log::debug!("split skipped: {err}");
                    stats.rejected += 1;
                }
            }
        }

        // 2. Collapse every edge shorter than the lower bound that passes
        // the link condition.
        let short_edges: Vec<EdgeId> = mesh
            .iter_edges()
            .filter(|(_, e)| e.length() < collapse_below)
            .map(|(id, _)| id)
            .collect();
        let mut collapses = 0;
        for e in short_edges {
            if mesh.edge(e).map(|edge| edge.length() < collapse_below) != Some(true) {
                continue;
            }
            match collapse_edge(mesh, e) {
                Ok(_) => collapses += 1,
                Err(err) if is_rejection(&err) => stats.rejected += 1,
                Err(err) => {
                    log::debug!("collapse skipped: {err}");
                    stats.rejected += 1;
                }
            }
        }

        // Refresh the derived structures before the constrained passes so
        // smoothing never consults deleted elements.
        if splits + collapses > 0 {
            mesh.classify_all();
            skeleton = Skeleton::build(mesh);
        }

        // 3. Delaunay flip pass.
        let flips = delaunay_pass(mesh)?;

        // 4. One damped tangential smoothing sweep.
        let smoothed = smooth_pass(mesh, &skeleton, options.smoothing_damping);

        // 5. Reclassify.
        mesh.classify_all();

        stats.splits += splits;
        stats.collapses += collapses;
        stats.flips += flips;
        stats.smoothed += smoothed;

        let quality = mesh.mean_triangle_quality();
        log::debug!(
            "remesh iteration {iteration}: {splits} splits, {collapses} collapses, \
             {flips} flips, {smoothed} smoothed, quality {quality:.4}"
        );

        if (quality - previous_quality).abs() < CONVERGENCE_QUALITY_DELTA {
            stats.converged = true;
            break;
        }
        previous_quality = quality;
    }

    stats.final_quality = mesh.mean_triangle_quality();
    stats.low_quality_faces = mesh
        .iter_faces()
        .filter(|&(f, _)| mesh.face_quality(f) < options.min_triangle_quality)
        .count();
    Ok(stats)
}

/// Buffer-level entry point: imports the host container (marking the
/// requested feature edges), remeshes, and exports.
pub fn remesh_buffers(
    positions: &[Vec3],
    indices: &[u32],
    options: &RemeshOptions,
) -> Result<(MeshBuffers, RemeshStats)> {
    let mut mesh =
        MeshConnectivity::from_buffers_with_features(positions, indices, &options.feature_edges)?;
    let stats = remesh(&mut mesh, options)?;
    Ok((mesh.to_buffers(), stats))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::validation::validate_topology;

    /// A planar strip of `nx` by `ny` quads, each split into two triangles.
    pub fn grid_strip(nx: usize, ny: usize, spacing: f32) -> (Vec<Vec3>, Vec<u32>) {
        let mut positions = Vec::new();
        for y in 0..=ny {
            for x in 0..=nx {
                positions.push(Vec3::new(x as f32 * spacing, y as f32 * spacing, 0.0));
            }
        }
        let stride = (nx + 1) as u32;
        let mut indices = Vec::new();
        for y in 0..ny as u32 {
            for x in 0..nx as u32 {
                let i = y * stride + x;
                indices.extend([i, i + 1, i + stride + 1]);
                indices.extend([i, i + stride + 1, i + stride]);
            }
        }
        (positions, indices)
    }

    #[test]
    fn auto_target_uses_bbox_diagonal() {
        let (positions, indices) = grid_strip(2, 1, 1.0);
        let mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();
        let expected = Vec3::new(2.0, 1.0, 0.0).length() / (6.0f32).sqrt();
        assert!((auto_target_edge_length(&mesh) - expected).abs() < 1e-5);
    }

    #[test]
    fn splitting_drives_edges_below_the_bound() {
        let (positions, indices) = grid_strip(4, 1, 1.0);
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();
        let options = RemeshOptions {
            target_edge_length: Some(0.5),
            iterations: 4,
            ..Default::default()
        };

        let stats = remesh(&mut mesh, &options).unwrap();
        assert!(stats.splits > 0);
        assert!(validate_topology(&mesh).is_valid());

        // The longest input edge was the sqrt(2) diagonal; refinement must
        // have brought the maximum well down towards the target.
        assert!(mesh.stats().max_edge_length <= 1.0);
    }

    #[test]
    fn collapsing_removes_tiny_edges() {
        // A grid with one very short row of edges
        let (mut positions, indices) = grid_strip(4, 1, 1.0);
        // Squash the top row towards the bottom one so the vertical edges
        // become short
        for p in positions.iter_mut() {
            if p.y > 0.5 {
                p.y = 0.05;
            }
        }
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();
        let options = RemeshOptions {
            target_edge_length: Some(1.0),
            iterations: 3,
            ..Default::default()
        };

        let stats = remesh(&mut mesh, &options).unwrap();
        assert!(stats.collapses > 0);
        assert!(validate_topology(&mesh).is_valid());
    }

    #[test]
    fn remesh_converges_on_an_already_good_mesh() {
        // A regular octahedron: every edge has length sqrt(2), every vertex
        // is stationary under tangential smoothing by symmetry, and every
        // edge is Delaunay. With a 1.2 target nothing splits or collapses.
        let positions = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        let indices = [
            4, 0, 2, 4, 2, 1, 4, 1, 3, 4, 3, 0, //
            5, 2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3,
        ];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();
        let options = RemeshOptions {
            target_edge_length: Some(1.2),
            iterations: 5,
            ..Default::default()
        };

        let stats = remesh(&mut mesh, &options).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations_run, 1);
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.collapses, 0);
        assert!(validate_topology(&mesh).is_valid());
        // A closed manifold mesh has no skeleton at all
        assert!(Skeleton::build(&mesh).is_empty());
    }

    #[test]
    fn remesh_buffers_round_trip() {
        let (positions, indices) = grid_strip(2, 2, 1.0);
        let options = RemeshOptions {
            target_edge_length: Some(1.0),
            iterations: 1,
            ..Default::default()
        };
        let (buffers, _) = remesh_buffers(&positions, &indices, &options).unwrap();
        assert!(!buffers.positions.is_empty());
        assert_eq!(buffers.indices.len() % 3, 0);
    }
}
