// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::RepairOp;
use crate::prelude::*;

/// Removes faces that reference the same vertex triple as an earlier face,
/// regardless of rotation or winding. One representative of each triple is
/// kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveDuplicateFaces;

/// Groups faces by their canonical (sorted) vertex triple. The returned
/// groups keep arena iteration order, so the kept face is deterministic.
fn duplicate_groups(mesh: &MeshConnectivity) -> Vec<Vec<FaceId>> {
    let mut groups: HashMap<[VertexId; 3], Vec<FaceId>> = HashMap::new();
    for (f, _) in mesh.iter_faces() {
        let vs = mesh.face_vertices(f);
        if vs.len() != 3 {
            continue;
        }
        let mut key = [vs[0], vs[1], vs[2]];
        key.sort_unstable();
        groups.entry(key).or_default().push(f);
    }
    groups.into_values().filter(|g| g.len() > 1).collect()
}

impl RepairOp for RemoveDuplicateFaces {
    fn name(&self) -> &'static str {
        "remove_duplicate_faces"
    }

    fn detect(&self, mesh: &MeshConnectivity) -> usize {
        duplicate_groups(mesh).iter().map(|g| g.len() - 1).sum()
    }

    fn repair(&self, mesh: &mut MeshConnectivity) -> Result<usize> {
        let mut fixed = 0;
        for group in duplicate_groups(mesh) {
            for &f in &group[1..] {
                if mesh.face(f).is_some() {
                    mesh.remove_face(f)?;
                    fixed += 1;
                }
            }
        }
        if fixed > 0 {
            mesh.classify_vertices();
        }
        Ok(fixed)
    }
}
