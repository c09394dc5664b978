// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use super::{RepairOp, REPAIR_LOOP_CAP};
use crate::prelude::*;

/// Makes face orientations consistent per connected component: a BFS from a
/// seed face crosses every two-halfedge edge and checks that the two sides
/// traverse it in opposite directions; faces on the wrong side get their
/// loop reversed. Non-manifold edges carry no well-defined orientation and
/// do not propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnifyNormals;

/// The set of faces that must flip to agree with their component's seed.
fn compute_flip_set(mesh: &MeshConnectivity) -> Vec<FaceId> {
    let mut needs_flip: HashMap<FaceId, bool> = HashMap::new();
    let mut queue = VecDeque::new();
    let cap = REPAIR_LOOP_CAP.max(mesh.num_faces() * 4);
    let mut iterations = 0;

    for (seed, _) in mesh.iter_faces() {
        if needs_flip.contains_key(&seed) {
            continue;
        }
        needs_flip.insert(seed, false);
        queue.push_back(seed);

        while let Some(f) = queue.pop_front() {
            if iterations > cap {
                break;
            }
            iterations += 1;

            let f_flipped = needs_flip[&f];
            for h in mesh.face_halfedges(f) {
                let e = match mesh[h].edge() {
                    Some(e) => e,
                    None => continue,
                };
                let members = mesh[e].halfedges();
                if members.len() != 2 {
                    continue;
                }
                let other = if members[0] == h {
                    members[1]
                } else {
                    members[0]
                };
                let g = match mesh[other].face() {
                    Some(g) => g,
                    None => continue,
                };
                if g == f {
                    continue;
                }

                // Consistent orientation traverses the shared edge in
                // opposite directions.
                let consistent = match (
                    mesh.at_halfedge(h).src_dst_pair(),
                    mesh.at_halfedge(other).src_dst_pair(),
                ) {
                    (Ok((s0, d0)), Ok((s1, d1))) => s0 == d1 && d0 == s1,
                    _ => continue,
                };

                let g_needs = f_flipped ^ !consistent;
                if let Some(&existing) = needs_flip.get(&g) {
                    if existing != g_needs {
                        // A Moebius-like component; no consistent global
                        // orientation exists. Leave the face as first seen.
                        continue;
                    }
                } else {
                    needs_flip.insert(g, g_needs);
                    queue.push_back(g);
                }
            }
        }
    }

    needs_flip
        .into_iter()
        .filter(|&(_, flip)| flip)
        .map(|(f, _)| f)
        .collect()
}

impl RepairOp for UnifyNormals {
    fn name(&self) -> &'static str {
        "unify_normals"
    }

    fn detect(&self, mesh: &MeshConnectivity) -> usize {
        compute_flip_set(mesh).len()
    }

    fn repair(&self, mesh: &mut MeshConnectivity) -> Result<usize> {
        let flips = compute_flip_set(mesh);
        let count = flips.len();
        for f in flips {
            mesh.reverse_face_orientation(f);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::validation::validate_topology;
    use crate::mesh::repair::RepairOp;

    #[test]
    fn consistent_mesh_needs_no_flips() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let indices = [0, 1, 2, 0, 2, 3];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();
        let op = UnifyNormals;
        assert_eq!(op.detect(&mesh), 0);
        assert_eq!(op.repair(&mut mesh).unwrap(), 0);
    }

    #[test]
    fn flipped_face_is_reversed() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        // The second triangle winds the wrong way: its diagonal halfedge
        // runs in the same direction as the first one's
        let indices = [0, 1, 2, 0, 3, 2];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();

        let op = UnifyNormals;
        assert_eq!(op.detect(&mesh), 1);
        let stats = op.execute(&mut mesh);
        assert!(stats.success);
        assert_eq!(stats.fixed, 1);
        assert!(validate_topology(&mesh).is_valid());

        // All face normals now agree
        let normals: Vec<Vec3> = mesh
            .iter_faces()
            .map(|(f, _)| mesh.face_normal(f).unwrap())
            .collect();
        assert!(normals[0].abs_diff_eq(normals[1], 1e-5));
        assert_eq!(op.detect(&mesh), 0);
    }

    #[test]
    fn components_are_unified_independently() {
        // Two disjoint quads, the second one internally inconsistent
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(6.0, 0.0, 0.0),
            Vec3::new(6.0, 1.0, 0.0),
            Vec3::new(5.0, 1.0, 0.0),
        ];
        let indices = [
            0, 1, 2, 0, 2, 3, // consistent
            4, 5, 6, 4, 7, 6, // inconsistent
        ];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();
        let op = UnifyNormals;
        assert_eq!(op.detect(&mesh), 1);
        op.repair(&mut mesh).unwrap();
        assert_eq!(op.detect(&mesh), 0);
        assert!(validate_topology(&mesh).is_valid());
    }
}
