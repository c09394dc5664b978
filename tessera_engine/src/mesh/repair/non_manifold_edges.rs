// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use super::RepairOp;
use crate::prelude::*;

/// How to resolve an edge with more than two incident faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonManifoldStrategy {
    /// Detach every extra face by duplicating one shared endpoint per face
    /// and rebuilding the face over the duplicate.
    Split,
    /// Delete the extra faces outright.
    Collapse,
    /// Split long edges (above the mean edge length), collapse short ones.
    #[default]
    Auto,
}

/// Repairs edges bounded by more than two faces. Two faces stay attached to
/// the edge; the rest are either re-homed onto duplicated vertices or
/// deleted, depending on the strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairNonManifoldEdges {
    pub strategy: NonManifoldStrategy,
}

fn find_non_manifold(mesh: &MeshConnectivity) -> Vec<EdgeId> {
    mesh.iter_edges()
        .filter(|(_, e)| e.halfedges().len() > 2)
        .map(|(e, _)| e)
        .collect()
}

impl RepairOp for RepairNonManifoldEdges {
    fn name(&self) -> &'static str {
        "repair_non_manifold_edges"
    }

    fn detect(&self, mesh: &MeshConnectivity) -> usize {
        find_non_manifold(mesh).len()
    }

    fn repair(&self, mesh: &mut MeshConnectivity) -> Result<usize> {
        let mean_length = mesh.mean_edge_length();
        let defects = find_non_manifold(mesh);
        let mut fixed = 0;

        for e in defects {
            // Earlier repairs may have already resolved this edge
            let still_bad = mesh
                .edge(e)
                .map(|edge| edge.halfedges().len() > 2)
                .unwrap_or(false);
            if !still_bad {
                continue;
            }

            let strategy = match self.strategy {
                NonManifoldStrategy::Auto => {
                    if mesh[e].length() > mean_length {
                        NonManifoldStrategy::Split
                    } else {
                        NonManifoldStrategy::Collapse
                    }
                }
                explicit => explicit,
            };

            let faces = mesh.edge_faces(e);
            if faces.len() <= 2 {
                continue;
            }
            let extra: Vec<FaceId> = faces[2..].to_vec();

            match strategy {
                NonManifoldStrategy::Split => {
                    // The duplicated endpoint is the canonical first one
                    let (dup_source, _) = mesh.edge_endpoints(e);
                    let dup_position = mesh.vertex_position(dup_source);
                    let dup_marked = mesh[dup_source].marked;

                    for f in extra {
                        let vs = mesh.face_vertices(f);
                        if vs.len() != 3 {
                            continue;
                        }
                        mesh.remove_face(f)?;
                        let dup = mesh.alloc_vertex(dup_position);
                        mesh[dup].marked = dup_marked;
                        let rebuilt: SVec<VertexId> = vs
                            .iter()
                            .map(|&v| if v == dup_source { dup } else { v })
                            .collect();
                        mesh.add_triangle(rebuilt[0], rebuilt[1], rebuilt[2])?;

                        let mut to_classify = rebuilt;
                        to_classify.push(dup_source);
                        for v in to_classify {
                            if mesh.vertex_exists(v) {
                                mesh.classify_vertex(v);
                            }
                        }
                    }
                }
                NonManifoldStrategy::Collapse | NonManifoldStrategy::Auto => {
                    for f in extra {
                        if mesh.face(f).is_some() {
                            mesh.remove_face(f)?;
                        }
                    }
                }
            }
            fixed += 1;
        }

        Ok(fixed)
    }
}
