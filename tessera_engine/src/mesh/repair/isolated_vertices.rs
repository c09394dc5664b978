// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::RepairOp;
use crate::prelude::*;

/// Removes vertices with no outgoing halfedge. The defect list is
/// data-independent, so removal order does not matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveIsolatedVertices;

fn find_isolated(mesh: &MeshConnectivity) -> Vec<VertexId> {
    mesh.iter_vertices()
        .filter(|(v, vertex)| vertex.halfedge().is_none() && mesh.incident_edges(*v).is_empty())
        .map(|(v, _)| v)
        .collect()
}

impl RepairOp for RemoveIsolatedVertices {
    fn name(&self) -> &'static str {
        "remove_isolated_vertices"
    }

    fn detect(&self, mesh: &MeshConnectivity) -> usize {
        find_isolated(mesh).len()
    }

    fn repair(&self, mesh: &mut MeshConnectivity) -> Result<usize> {
        let isolated = find_isolated(mesh);
        let count = isolated.len();
        for v in isolated {
            mesh.remove_vertex(v);
        }
        Ok(count)
    }
}
