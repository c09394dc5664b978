// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

/// One violated invariant, scoped to the offending element. Degenerate faces
/// are reported as warnings; everything else invalidates the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyIssue {
    VertexHalfedgeDangling(VertexId),
    VertexHalfedgeWrongSource(VertexId, HalfEdgeId),
    VertexPositionNotFinite(VertexId),
    EdgeEmpty(EdgeId),
    EdgeMemberDangling(EdgeId, HalfEdgeId),
    EdgeMemberWrongEdge(EdgeId, HalfEdgeId),
    EdgeLengthNotFinite(EdgeId),
    EdgeKindMismatch(EdgeId),
    EdgeRepresentativeMissing(EdgeId),
    EdgeRepresentativeNotMember(EdgeId),
    FaceHalfedgeMissing(FaceId),
    FaceLoopNotTriangle(FaceId),
    FaceLoopWrongFace(FaceId, HalfEdgeId),
    FaceDegenerate(FaceId),
    HalfedgeNextMissing(HalfEdgeId),
    HalfedgePrevMissing(HalfEdgeId),
    HalfedgeNextPrevMismatch(HalfEdgeId),
    HalfedgeTwinMismatch(HalfEdgeId),
    HalfedgeVertexDangling(HalfEdgeId),
    HalfedgeEdgeDangling(HalfEdgeId),
    HalfedgeNotInItsEdge(HalfEdgeId),
    HalfedgeFaceDangling(HalfEdgeId),
}

impl std::fmt::Display for TopologyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{self:?}"))
    }
}

/// The outcome of a validation walk. Errors make the mesh invalid; warnings
/// do not.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<TopologyIssue>,
    pub warnings: Vec<TopologyIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turns the report into a hard failure carrying the offending issues.
    pub fn ensure_valid(self) -> Result<(), ValidationFailed> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ValidationFailed(self.errors))
        }
    }
}

/// A post-condition check failed; carries every element-scoped error found.
#[derive(Debug, Clone)]
pub struct ValidationFailed(pub Vec<TopologyIssue>);

impl std::fmt::Display for ValidationFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "topology validation failed with {} errors", self.0.len())?;
        for issue in self.0.iter().take(8) {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}
impl std::error::Error for ValidationFailed {}

/// Walks all four arenas checking the structural invariants of the store.
#[profiling::function]
pub fn validate_topology(conn: &MeshConnectivity) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (v, vertex) in conn.iter_vertices() {
        if !vertex.position.is_finite() {
            report.errors.push(TopologyIssue::VertexPositionNotFinite(v));
        }
        if let Some(h) = vertex.halfedge() {
            match conn.halfedge(h) {
                None => report.errors.push(TopologyIssue::VertexHalfedgeDangling(v)),
                Some(_) => {
                    if conn.halfedge_src(h) != Some(v) {
                        report
                            .errors
                            .push(TopologyIssue::VertexHalfedgeWrongSource(v, h));
                    }
                }
            }
        }
    }

    for (e, edge) in conn.iter_edges() {
        if edge.halfedges().is_empty() {
            report.errors.push(TopologyIssue::EdgeEmpty(e));
        }
        for &h in edge.halfedges() {
            match conn.halfedge(h) {
                None => report.errors.push(TopologyIssue::EdgeMemberDangling(e, h)),
                Some(half) => {
                    if half.edge() != Some(e) {
                        report.errors.push(TopologyIssue::EdgeMemberWrongEdge(e, h));
                    }
                }
            }
        }
        if !edge.length().is_finite() || edge.length() < 0.0 {
            report.errors.push(TopologyIssue::EdgeLengthNotFinite(e));
        }
        match edge.halfedge() {
            None => report.errors.push(TopologyIssue::EdgeRepresentativeMissing(e)),
            Some(rep) => {
                if !edge.halfedges().contains(&rep) {
                    report
                        .errors
                        .push(TopologyIssue::EdgeRepresentativeNotMember(e));
                }
            }
        }

        let expected = match conn.edge_face_count(e) {
            0 | 1 => EdgeKind::Boundary,
            2 => {
                if edge.kind() == EdgeKind::Feature {
                    EdgeKind::Feature
                } else {
                    EdgeKind::Manifold
                }
            }
            _ => EdgeKind::NonManifold,
        };
        if edge.kind() != expected {
            report.errors.push(TopologyIssue::EdgeKindMismatch(e));
        }
    }

    for (f, face) in conn.iter_faces() {
        let h0 = match face.halfedge() {
            Some(h0) if conn.halfedge(h0).is_some() => h0,
            _ => {
                report.errors.push(TopologyIssue::FaceHalfedgeMissing(f));
                continue;
            }
        };
        match conn.at_face(f).halfedges() {
            Err(_) => {
                report.errors.push(TopologyIssue::FaceLoopNotTriangle(f));
                continue;
            }
            Ok(hs) => {
                if hs.len() != 3 {
                    report.errors.push(TopologyIssue::FaceLoopNotTriangle(f));
                }
                for &h in &hs {
                    if conn[h].face() != Some(f) {
                        report.errors.push(TopologyIssue::FaceLoopWrongFace(f, h));
                    }
                }
                // The three-step next-cycle must return to the representative
                let closes = conn
                    .at_halfedge(h0)
                    .next()
                    .next()
                    .next()
                    .try_end()
                    .map(|h| h == h0)
                    .unwrap_or(false);
                if !closes {
                    report.errors.push(TopologyIssue::FaceLoopNotTriangle(f));
                }
            }
        }
        if conn.face_area(f) <= AREA_EPSILON {
            report.warnings.push(TopologyIssue::FaceDegenerate(f));
        }
    }

    for (h, halfedge) in conn.iter_halfedges() {
        match halfedge.next() {
            None => report.errors.push(TopologyIssue::HalfedgeNextMissing(h)),
            Some(next) => {
                if conn.halfedge(next).and_then(|n| n.prev()) != Some(h) {
                    report
                        .errors
                        .push(TopologyIssue::HalfedgeNextPrevMismatch(h));
                }
            }
        }
        match halfedge.prev() {
            None => report.errors.push(TopologyIssue::HalfedgePrevMissing(h)),
            Some(prev) => {
                if conn.halfedge(prev).and_then(|p| p.next()) != Some(h) {
                    report
                        .errors
                        .push(TopologyIssue::HalfedgeNextPrevMismatch(h));
                }
            }
        }
        if let Some(twin) = halfedge.twin() {
            if conn.halfedge(twin).and_then(|t| t.twin()) != Some(h) {
                report.errors.push(TopologyIssue::HalfedgeTwinMismatch(h));
            }
        }
        match halfedge.vertex() {
            None => report.errors.push(TopologyIssue::HalfedgeVertexDangling(h)),
            Some(v) => {
                if conn.vertex(v).is_none() {
                    report.errors.push(TopologyIssue::HalfedgeVertexDangling(h));
                }
            }
        }
        match halfedge.edge() {
            None => report.errors.push(TopologyIssue::HalfedgeEdgeDangling(h)),
            Some(e) => match conn.edge(e) {
                None => report.errors.push(TopologyIssue::HalfedgeEdgeDangling(h)),
                Some(edge) => {
                    if !edge.halfedges().contains(&h) {
                        report.errors.push(TopologyIssue::HalfedgeNotInItsEdge(h));
                    }
                }
            },
        }
        if let Some(f) = halfedge.face() {
            if conn.face(f).is_none() {
                report.errors.push(TopologyIssue::HalfedgeFaceDangling(h));
            }
        }
    }

    report
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::test::{non_manifold_seam, single_triangle, two_triangle_quad};

    #[test]
    fn well_formed_meshes_validate() {
        assert!(validate_topology(&single_triangle()).is_valid());
        assert!(validate_topology(&two_triangle_quad()).is_valid());
        assert!(validate_topology(&non_manifold_seam()).is_valid());
    }

    #[test]
    fn degenerate_face_is_a_warning_not_an_error() {
        let positions = [
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let indices = [0, 1, 2, 0, 3, 4];
        let mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();

        let report = validate_topology(&mesh);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, TopologyIssue::FaceDegenerate(_))));
    }

    #[test]
    fn corrupted_kind_is_detected() {
        let mut mesh = two_triangle_quad();
        let (e, _) = mesh.iter_edges().next().unwrap();
        mesh.set_edge_kind(
            e,
            match mesh[e].kind() {
                EdgeKind::Boundary => EdgeKind::NonManifold,
                _ => EdgeKind::Boundary,
            },
        );
        let report = validate_topology(&mesh);
        assert!(!report.is_valid());
        assert!(report
            .errors
            .iter()
            .any(|i| matches!(i, TopologyIssue::EdgeKindMismatch(_))));
        assert!(report.clone().ensure_valid().is_err());
    }
}
