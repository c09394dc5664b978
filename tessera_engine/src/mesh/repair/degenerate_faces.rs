// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use rayon::prelude::*;

use super::RepairOp;
use crate::prelude::*;

/// Removes triangles that have (numerically) no area or a repeated vertex.
/// Erasing a face detaches its halfedges from their edges and drops edges
/// that end up with none.
#[derive(Debug, Clone, Copy)]
pub struct RemoveDegenerateFaces {
    pub area_threshold: f32,
}

impl Default for RemoveDegenerateFaces {
    fn default() -> Self {
        Self {
            area_threshold: 1e-10,
        }
    }
}

fn is_degenerate(mesh: &MeshConnectivity, f: FaceId, area_threshold: f32) -> bool {
    let vs = mesh.face_vertices(f);
    if vs.len() != 3 || vs[0] == vs[1] || vs[1] == vs[2] || vs[0] == vs[2] {
        return true;
    }
    mesh.face_area(f) < area_threshold
}

fn find_degenerate(mesh: &MeshConnectivity, area_threshold: f32) -> Vec<FaceId> {
    // The per-face predicate is independent of every other face, so the scan
    // can shard freely.
    let faces: Vec<FaceId> = mesh.iter_faces().map(|(f, _)| f).collect();
    faces
        .into_par_iter()
        .filter(|&f| is_degenerate(mesh, f, area_threshold))
        .collect()
}

impl RepairOp for RemoveDegenerateFaces {
    fn name(&self) -> &'static str {
        "remove_degenerate_faces"
    }

    fn detect(&self, mesh: &MeshConnectivity) -> usize {
        find_degenerate(mesh, self.area_threshold).len()
    }

    fn repair(&self, mesh: &mut MeshConnectivity) -> Result<usize> {
        let degenerate = find_degenerate(mesh, self.area_threshold);
        let mut fixed = 0;
        for f in degenerate {
            if mesh.face(f).is_some() {
                mesh.remove_face(f)?;
                fixed += 1;
            }
        }
        if fixed > 0 {
            mesh.classify_vertices();
        }
        Ok(fixed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::repair::RepairOp;

    #[test]
    fn zero_area_triangle_is_removed_and_the_valid_one_stays() {
        let positions = [
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.5, 1.0, 0.0),
        ];
        // One collapsed triangle next to a valid one
        let indices = [0, 1, 2, 0, 3, 4];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();

        let op = RemoveDegenerateFaces::default();
        let stats = op.execute(&mut mesh);
        assert!(stats.success);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.fixed, 1);
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(op.detect(&mesh), 0);
    }

    #[test]
    fn repeated_vertex_counts_as_degenerate() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.5, 1.0, 0.0),
        ];
        // The second triangle repeats a vertex
        let indices = [0, 1, 2, 0, 1, 0];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();

        let op = RemoveDegenerateFaces::default();
        assert_eq!(op.detect(&mesh), 1);
        let fixed = op.repair(&mut mesh).unwrap();
        assert_eq!(fixed, 1);
        assert_eq!(mesh.num_faces(), 1);
    }
}
