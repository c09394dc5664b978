// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

/// An ordered run of skeleton edges between two branching vertices, or a
/// closed loop of open-book vertices. Segments reference mesh elements
/// weakly: they are derived data, rebuilt on demand after topology changes.
#[derive(Debug, Clone)]
pub struct SkeletonSegment {
    /// The vertices along the segment. For closed segments the duplicate end
    /// vertex is removed, so the last edge joins `vertices.last()` back to
    /// `vertices[0]`.
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
    /// Cumulative arc length. `arc_lengths[i]` is the distance from the
    /// segment start to the source of `edges[i]`; the final entry is the
    /// total length. Always `edges.len() + 1` entries.
    pub arc_lengths: Vec<f32>,
    pub closed: bool,
}

impl SkeletonSegment {
    pub fn total_length(&self) -> f32 {
        self.arc_lengths.last().copied().unwrap_or(0.0)
    }

    /// Endpoints of the i-th edge along the segment, in traversal order.
    fn edge_endpoints_at(&self, i: usize) -> (VertexId, VertexId) {
        let a = self.vertices[i];
        let b = self.vertices[(i + 1) % self.vertices.len()];
        (a, b)
    }
}

/// The closest point on a skeleton segment to some query position.
#[derive(Debug, Clone, Copy)]
pub struct SkeletonProjection {
    pub position: Vec3,
    /// Index into [`Skeleton::segments`].
    pub segment: usize,
    /// Arc-length parameter over the whole segment, in [0, 1].
    pub t: f32,
    pub distance: f32,
}

/// The skeleton of a mesh: all boundary, feature and non-manifold edges,
/// partitioned into segments.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    segments: Vec<SkeletonSegment>,
    /// Maps open-book vertices interior to a segment to that segment's
    /// index. Branching endpoints are not included.
    vertex_segment: HashMap<VertexId, usize>,
}

impl Skeleton {
    /// Extracts all skeleton segments. Branching vertices seed traces that
    /// follow open-book chains; whatever skeleton edges remain untouched
    /// afterwards belong to closed loops with no branching vertex on them.
    pub fn build(conn: &MeshConnectivity) -> Self {
        let mut used = HashSet::new();
        let mut segments = Vec::new();

        for (v, vertex) in conn.iter_vertices() {
            if vertex.kind() != VertexKind::SkeletonBranching {
                continue;
            }
            let incident: SVec<EdgeId> = conn
                .incident_edges(v)
                .iter()
                .copied()
                .filter(|&e| conn[e].kind().is_skeleton())
                .collect();
            for e in incident {
                if !used.contains(&e) {
                    segments.push(trace_segment(conn, v, e, &mut used));
                }
            }
        }

        let loop_seeds: Vec<EdgeId> = conn
            .iter_edges()
            .filter(|(e, edge)| edge.kind().is_skeleton() && !used.contains(e))
            .map(|(e, _)| e)
            .collect();
        for e in loop_seeds {
            if !used.contains(&e) {
                let (start, _) = conn.edge_endpoints(e);
                segments.push(trace_segment(conn, start, e, &mut used));
            }
        }

        let mut vertex_segment = HashMap::new();
        for (idx, segment) in segments.iter().enumerate() {
            let interior = if segment.closed {
                &segment.vertices[..]
            } else {
                let n = segment.vertices.len();
                if n <= 2 {
                    &[]
                } else {
                    &segment.vertices[1..n - 1]
                }
            };
            for &v in interior {
                if conn.vertex(v).map(|vx| vx.kind()) == Some(VertexKind::OpenBook) {
                    vertex_segment.insert(v, idx);
                }
            }
        }

        Self {
            segments,
            vertex_segment,
        }
    }

    pub fn segments(&self) -> &[SkeletonSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_for_vertex(&self, v: VertexId) -> Option<usize> {
        self.vertex_segment.get(&v).copied()
    }

    /// Closest point on one segment. Stale vertex references (the mesh may
    /// have changed since the skeleton was built) make individual edges drop
    /// out of consideration instead of failing the query.
    pub fn project_onto_segment(
        &self,
        conn: &MeshConnectivity,
        segment: usize,
        p: Vec3,
    ) -> Option<SkeletonProjection> {
        let seg = self.segments.get(segment)?;
        let total = seg.total_length();

        let mut best: Option<SkeletonProjection> = None;
        for i in 0..seg.edges.len() {
            let (va, vb) = seg.edge_endpoints_at(i);
            let (a, b) = match (conn.vertex(va), conn.vertex(vb)) {
                (Some(a), Some(b)) => (a.position, b.position),
                _ => continue,
            };
            let (point, t_local) = closest_point_on_segment(p, a, b);
            let distance = point.distance(p);
            if best.map(|b| distance < b.distance).unwrap_or(true) {
                let edge_len = seg.arc_lengths[i + 1] - seg.arc_lengths[i];
                let t = if total > 0.0 {
                    ((seg.arc_lengths[i] + t_local * edge_len) / total).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                best = Some(SkeletonProjection {
                    position: point,
                    segment,
                    t,
                    distance,
                });
            }
        }
        best
    }

    /// Closest point on any segment of the skeleton.
    pub fn project_point(&self, conn: &MeshConnectivity, p: Vec3) -> Option<SkeletonProjection> {
        let mut best: Option<SkeletonProjection> = None;
        for idx in 0..self.segments.len() {
            if let Some(proj) = self.project_onto_segment(conn, idx, p) {
                if best.map(|b| proj.distance < b.distance).unwrap_or(true) {
                    best = Some(proj);
                }
            }
        }
        best
    }
}

/// Walks from `start` along `first_edge`, continuing through open-book
/// vertices until a branching vertex, a dead end, or the starting vertex
/// closes the loop.
fn trace_segment(
    conn: &MeshConnectivity,
    start: VertexId,
    first_edge: EdgeId,
    used: &mut HashSet<EdgeId>,
) -> SkeletonSegment {
    let mut vertices = vec![start];
    let mut edges = Vec::new();
    let mut closed = false;

    let mut cur = start;
    let mut e = first_edge;
    let mut counter = 0;

    loop {
        // A segment can never have more edges than the mesh
        if counter > conn.num_edges() {
            break;
        }
        counter += 1;

        used.insert(e);
        edges.push(e);
        let (a, b) = conn.edge_endpoints(e);
        let next = if a == cur { b } else { a };
        vertices.push(next);
        cur = next;

        if cur == start {
            closed = true;
            // The duplicate end vertex is removed from the sequence
            vertices.pop();
            break;
        }
        if conn[cur].kind() != VertexKind::OpenBook {
            break;
        }

        let continuation = conn
            .incident_edges(cur)
            .iter()
            .copied()
            .find(|&cand| conn[cand].kind().is_skeleton() && !used.contains(&cand));
        match continuation {
            Some(cand) => e = cand,
            None => break,
        }
    }

    let mut arc_lengths = Vec::with_capacity(edges.len() + 1);
    arc_lengths.push(0.0);
    let mut acc = 0.0;
    for &e in &edges {
        acc += conn[e].length();
        arc_lengths.push(acc);
    }

    SkeletonSegment {
        vertices,
        edges,
        arc_lengths,
        closed,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::test::{non_manifold_seam, two_triangle_quad};

    #[test]
    fn quad_boundary_is_one_closed_loop() {
        let mesh = two_triangle_quad();
        let skeleton = Skeleton::build(&mesh);
        assert_eq!(skeleton.segments().len(), 1);

        let seg = &skeleton.segments()[0];
        assert!(seg.closed);
        assert_eq!(seg.edges.len(), 4);
        assert_eq!(seg.vertices.len(), 4);
        assert!((seg.total_length() - 4.0).abs() < 1e-5);

        // Every loop vertex is open-book and interior to the segment
        for (v, _) in mesh.iter_vertices() {
            assert_eq!(skeleton.segment_for_vertex(v), Some(0));
        }
    }

    #[test]
    fn feature_diagonal_splits_the_boundary() {
        let mut mesh = two_triangle_quad();
        let diagonal = mesh
            .iter_edges()
            .find(|(_, e)| e.kind() == EdgeKind::Manifold)
            .map(|(id, _)| id)
            .unwrap();
        let (a, b) = mesh.edge_endpoints(diagonal);
        mesh.mark_feature_edge(a, b).unwrap();

        let skeleton = Skeleton::build(&mesh);
        // Two boundary arcs between the branching corners, plus the diagonal
        assert_eq!(skeleton.segments().len(), 3);
        for seg in skeleton.segments() {
            assert!(!seg.closed);
        }

        let diagonal_segments = skeleton
            .segments()
            .iter()
            .filter(|s| s.edges.len() == 1)
            .count();
        assert_eq!(diagonal_segments, 1);
    }

    #[test]
    fn seam_segments_meet_at_branching_vertices() {
        let mesh = non_manifold_seam();
        let skeleton = Skeleton::build(&mesh);
        // The seam edge plus three boundary arcs (one over each wing tip)
        assert_eq!(skeleton.segments().len(), 4);

        let total_edges: usize = skeleton.segments().iter().map(|s| s.edges.len()).sum();
        assert_eq!(total_edges, 7);
    }

    #[test]
    fn projection_lands_on_the_boundary() {
        let mesh = two_triangle_quad();
        let skeleton = Skeleton::build(&mesh);

        let proj = skeleton
            .project_point(&mesh, Vec3::new(0.5, -2.0, 0.0))
            .unwrap();
        assert!(proj.position.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-5));
        assert!((proj.distance - 2.0).abs() < 1e-5);
        assert!((0.0..=1.0).contains(&proj.t));

        // A point just off a corner projects onto the corner
        let proj = skeleton
            .project_point(&mesh, Vec3::new(-1.0, -1.0, 0.0))
            .unwrap();
        assert!(proj.position.abs_diff_eq(Vec3::ZERO, 1e-5));
    }
}
