// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{RepairOp, REPAIR_LOOP_CAP};
use crate::prelude::*;

/// Closes holes by walking boundary loops and ear-clipping them. Loops
/// longer than `max_hole_size` are left open. The ear test works directly in
/// 3D on a positive-area criterion plus loop-vertex containment; strongly
/// non-planar holes therefore depend on the loop's vertex order.
#[derive(Debug, Clone, Copy)]
pub struct FillHoles {
    pub max_hole_size: usize,
}

impl Default for FillHoles {
    fn default() -> Self {
        Self { max_hole_size: 100 }
    }
}

/// Extracts closed boundary loops, ordered so that consecutive loop vertices
/// run opposite to the existing face halfedges. Triangles built over
/// consecutive pairs then pair up as twins with the surrounding surface.
fn extract_boundary_loops(mesh: &MeshConnectivity) -> Vec<Vec<VertexId>> {
    let mut visited: HashSet<EdgeId> = HashSet::new();
    let mut loops = Vec::new();

    let boundary: Vec<EdgeId> = mesh
        .iter_edges()
        .filter(|(_, e)| e.kind() == EdgeKind::Boundary)
        .map(|(e, _)| e)
        .collect();

    for e0 in boundary {
        if visited.contains(&e0) {
            continue;
        }
        visited.insert(e0);

        let h = match mesh[e0].halfedge() {
            Some(h) => h,
            None => continue,
        };
        let (s, d) = match mesh.at_halfedge(h).src_dst_pair() {
            Ok(pair) => pair,
            Err(_) => continue,
        };

        // The face halfedge runs s -> d; the hole side runs d -> s
        let start = d;
        let mut loop_vertices = vec![d, s];
        let mut prev_edge = e0;
        let mut cur = s;
        let mut closed = false;
        let mut counter = 0;

        loop {
            if counter > mesh.num_edges() {
                break;
            }
            counter += 1;

            let candidates = mesh.incident_edges(cur);
            // Prefer the orientation-consistent continuation: a boundary
            // edge whose face halfedge targets the current vertex.
            let next_edge = candidates
                .iter()
                .copied()
                .find(|&cand| {
                    cand != prev_edge
                        && !visited.contains(&cand)
                        && mesh[cand].kind() == EdgeKind::Boundary
                        && mesh[cand]
                            .halfedge()
                            .and_then(|ch| mesh.halfedge_dst(ch))
                            == Some(cur)
                })
                .or_else(|| {
                    candidates.iter().copied().find(|&cand| {
                        cand != prev_edge
                            && !visited.contains(&cand)
                            && mesh[cand].kind() == EdgeKind::Boundary
                    })
                });

            let next_edge = match next_edge {
                Some(ne) => ne,
                None => break,
            };
            visited.insert(next_edge);
            let (a, b) = mesh.edge_endpoints(next_edge);
            let next_vertex = if a == cur { b } else { a };
            if next_vertex == start {
                closed = true;
                break;
            }
            loop_vertices.push(next_vertex);
            prev_edge = next_edge;
            cur = next_vertex;
        }

        if closed && loop_vertices.len() >= 3 {
            loops.push(loop_vertices);
        }
    }

    loops
}

/// Ear-clips one loop. Returns the number of triangles added and whether the
/// loop was closed completely.
fn fill_loop(mesh: &mut MeshConnectivity, mut ring: Vec<VertexId>) -> Result<(usize, bool)> {
    let mut faces_added = 0;
    let mut guard = 0;

    while ring.len() > 3 {
        if guard > REPAIR_LOOP_CAP {
            return Ok((faces_added, false));
        }
        guard += 1;

        let n = ring.len();
        let mut clipped = false;
        for i in 0..n {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let pp = mesh.vertex_position(prev);
            let pc = mesh.vertex_position(cur);
            let pn = mesh.vertex_position(next);

            if triangle_area(pp, pc, pn) <= AREA_EPSILON {
                continue;
            }
            // The ear may not contain any other loop vertex
            let contains_other = ring.iter().any(|&v| {
                v != prev
                    && v != cur
                    && v != next
                    && point_in_triangle(mesh.vertex_position(v), pp, pc, pn)
            });
            if contains_other {
                continue;
            }

            mesh.add_triangle(prev, cur, next)?;
            faces_added += 1;
            ring.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            // No valid ear left; give up on the remainder
            return Ok((faces_added, false));
        }
    }

    if ring.len() == 3 {
        let pp = mesh.vertex_position(ring[0]);
        let pc = mesh.vertex_position(ring[1]);
        let pn = mesh.vertex_position(ring[2]);
        if triangle_area(pp, pc, pn) > AREA_EPSILON {
            mesh.add_triangle(ring[0], ring[1], ring[2])?;
            faces_added += 1;
            return Ok((faces_added, true));
        }
    }
    Ok((faces_added, false))
}

impl RepairOp for FillHoles {
    fn name(&self) -> &'static str {
        "fill_holes"
    }

    fn detect(&self, mesh: &MeshConnectivity) -> usize {
        extract_boundary_loops(mesh)
            .iter()
            .filter(|l| l.len() <= self.max_hole_size)
            .count()
    }

    fn repair(&self, mesh: &mut MeshConnectivity) -> Result<usize> {
        let loops = extract_boundary_loops(mesh);
        let mut holes_closed = 0;
        for ring in loops {
            if ring.len() > self.max_hole_size {
                log::debug!(
                    "skipping boundary loop with {} edges (max hole size {})",
                    ring.len(),
                    self.max_hole_size
                );
                continue;
            }
            let (_, fully_closed) = fill_loop(mesh, ring)?;
            if fully_closed {
                holes_closed += 1;
            }
        }
        if holes_closed > 0 {
            mesh.classify_vertices();
        }
        Ok(holes_closed)
    }
}
