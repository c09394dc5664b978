// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

impl MeshConnectivity {
    /// Reclassifies one edge from its incident-face count. The `Feature` mark
    /// is sticky: a user-marked edge stays a feature as long as it keeps
    /// exactly two faces.
    pub fn classify_edge(&mut self, e: EdgeId) {
        let face_count = self.edge_face_count(e);
        let kind = match face_count {
            0 | 1 => EdgeKind::Boundary,
            2 => {
                if self.edges[e].kind == EdgeKind::Feature {
                    EdgeKind::Feature
                } else {
                    EdgeKind::Manifold
                }
            }
            _ => EdgeKind::NonManifold,
        };
        self.edges[e].kind = kind;
    }

    pub fn classify_edges(&mut self) {
        let ids: Vec<EdgeId> = self.edges.keys().collect();
        for e in ids {
            self.classify_edge(e);
        }
    }

    /// Whether an edge belongs to the skeleton (boundary, feature or
    /// non-manifold).
    pub fn is_skeleton_edge(&self, e: EdgeId) -> bool {
        self.edges[e].kind.is_skeleton()
    }

    /// Number of skeleton edges incident to a vertex.
    pub fn skeleton_edge_count(&self, v: VertexId) -> usize {
        self.incident_edges(v)
            .iter()
            .filter(|&&e| self.edges[e].kind.is_skeleton())
            .count()
    }

    /// Reclassifies one vertex from its incident skeleton-edge count `k`:
    /// k = 0 is manifold (isolated vertices included by convention), k = 2 is
    /// open-book, and k = 1 or k > 2 is branching.
    pub fn classify_vertex(&mut self, v: VertexId) {
        let k = self.skeleton_edge_count(v);
        let kind = match k {
            0 => VertexKind::Manifold,
            2 => VertexKind::OpenBook,
            _ => VertexKind::SkeletonBranching,
        };
        self.vertices[v].kind = kind;
    }

    pub fn classify_vertices(&mut self) {
        let ids: Vec<VertexId> = self.vertices.keys().collect();
        for v in ids {
            self.classify_vertex(v);
        }
    }

    /// Full reclassification: edges first, then vertices, since vertex kinds
    /// derive from edge kinds.
    pub fn classify_all(&mut self) {
        self.classify_edges();
        self.classify_vertices();
    }
}
