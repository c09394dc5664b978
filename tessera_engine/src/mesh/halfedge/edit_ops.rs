// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::bail;

use crate::prelude::*;

/// Structured rejection reasons for the local operators. None of these are
/// recoverable by retrying at the point of failure; callers record them and
/// move on. Real corruption surfaces as [`TraversalError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpRejection {
    /// The endpoint neighborhoods share more vertices than faces; collapsing
    /// would fold the surface.
    LinkConditionViolated,
    /// The quadrilateral around the edge is not convex in the tangent plane.
    NonConvexQuad,
    /// The edge is not a two-face manifold edge, or flipping it would create
    /// a duplicate or degenerate configuration.
    NotFlippable,
    /// The smoothing target would collapse an incident face below the area
    /// epsilon.
    RelocationInvalid,
    /// A required next/prev/twin pointer is missing; the operator declines.
    MissingNeighbor,
}

impl std::fmt::Display for OpRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{self:?}"))
    }
}
impl std::error::Error for OpRejection {}

/// Returns true when `err` is a structured operator rejection rather than a
/// real failure.
pub fn is_rejection(err: &anyhow::Error) -> bool {
    err.downcast_ref::<OpRejection>().is_some()
}

/* ============ */
/*  Edge split  */
/* ============ */

/// Splits `e` at parameter `t` (measured from the canonical first endpoint),
/// inserting a new vertex and subdividing every incident face into two
/// triangles. Works for boundary, manifold and non-manifold edges alike.
/// Skeleton classification is inherited by both halves. Returns the new
/// vertex.
pub fn split_edge(mesh: &mut MeshConnectivity, e: EdgeId, t: f32) -> Result<VertexId> {
    if !(0.0..=1.0).contains(&t) {
        bail!("split_edge: parameter {t} outside [0, 1]");
    }
    let (a, b) = mesh.edge_endpoints(e);
    let old_kind = mesh[e].kind();

    // Collect the (src, dst, opposite) corner triple of every incident face,
    // oriented so src -> dst runs along the edge within that face.
    let faces = mesh.edge_faces(e);
    if faces.is_empty() {
        bail!("split_edge: edge {e:?} has no incident face");
    }
    let mut triples = SVec::<(VertexId, VertexId, VertexId)>::new();
    let mut rim_features = SVec::<(VertexId, VertexId)>::new();
    for &f in &faces {
        let hs = mesh.at_face(f).halfedges()?;
        if hs.len() != 3 {
            bail!("split_edge: face {f:?} is not a triangle");
        }
        let h_e = hs
            .iter()
            .copied()
            .find(|&h| mesh[h].edge() == Some(e))
            .ok_or(OpRejection::MissingNeighbor)?;
        let (s, d) = mesh.at_halfedge(h_e).src_dst_pair()?;
        let o = mesh.at_halfedge(h_e).next().vertex().try_end()?;
        if s == d || s == o || d == o {
            bail!("split_edge: face {f:?} has repeated vertices");
        }
        triples.push((s, d, o));
        // The rim edges get torn down and rebuilt with the faces; remember
        // which ones carried a feature mark.
        for (x, y) in [(d, o), (o, s)] {
            if let Some(rim) = mesh.edge_between(x, y) {
                if mesh[rim].kind() == EdgeKind::Feature {
                    rim_features.push((x, y));
                }
            }
        }
    }

    let position = lerp(mesh.vertex_position(a), mesh.vertex_position(b), t);

    for &f in &faces {
        mesh.remove_face(f)?;
    }

    let x = mesh.alloc_vertex(position);
    if old_kind == EdgeKind::Feature {
        mesh[x].marked = true;
    }

    let mut touched = SVec::<VertexId>::new();
    touched.push(a);
    touched.push(b);
    touched.push(x);
    for &(s, d, o) in &triples {
        mesh.add_triangle(s, x, o)?;
        mesh.add_triangle(x, d, o)?;
        touched.push(o);
    }

    // Restore feature stickiness on the rebuilt rim edges and on both halves
    // of the split edge. Boundary and non-manifold kinds re-derive from the
    // face counts on their own.
    for (p, q) in rim_features {
        if let Some(rim) = mesh.edge_between(p, q) {
            if mesh[rim].kind() == EdgeKind::Manifold {
                mesh.set_edge_kind(rim, EdgeKind::Feature);
            }
        }
    }
    if old_kind == EdgeKind::Feature {
        for half in [mesh.edge_between(a, x), mesh.edge_between(x, b)] {
            if let Some(half) = half {
                if mesh[half].kind() == EdgeKind::Manifold {
                    mesh.set_edge_kind(half, EdgeKind::Feature);
                }
            }
        }
    }

    touched.sort_unstable();
    touched.dedup();
    for v in touched {
        if mesh.vertex_exists(v) {
            mesh.classify_vertex(v);
        }
    }

    Ok(x)
}

/* ============== */
/*  Edge collapse */
/* ============== */

/// Collapses `e`, merging its endpoints into one surviving vertex. The
/// surviving endpoint is chosen by classification priority (branching over
/// open-book over manifold); the surviving position keeps fixed vertices in
/// place and takes the midpoint otherwise. Rejected with
/// [`OpRejection::LinkConditionViolated`] when the one-ring intersection of
/// the endpoints is larger than the number of faces they share.
pub fn collapse_edge(mesh: &mut MeshConnectivity, e: EdgeId) -> Result<VertexId> {
    let (a, b) = mesh.edge_endpoints(e);
    if a == b {
        bail!("collapse_edge: cannot collapse a self-loop");
    }
    let ka = mesh[a].kind();
    let kb = mesh[b].kind();
    if ka.is_position_fixed() && kb.is_position_fixed() {
        bail!("collapse_edge: both endpoints are position-fixed");
    }

    // Link condition: the common one-ring neighborhood, excluding the
    // endpoints themselves, must not exceed the shared face count (2 for
    // interior manifold edges, 1 on the boundary).
    let neighbors_a: HashSet<VertexId> = mesh
        .vertex_neighbors(a)
        .into_iter()
        .filter(|&v| v != b)
        .collect();
    let neighbors_b: HashSet<VertexId> = mesh
        .vertex_neighbors(b)
        .into_iter()
        .filter(|&v| v != a)
        .collect();
    let common = neighbors_a.intersection(&neighbors_b).count();
    let shared_faces = mesh.edge_face_count(e);
    if common > shared_faces {
        return Err(OpRejection::LinkConditionViolated.into());
    }

    // Choose the survivor and its position
    let (survivor, removed) = if ka.collapse_priority() >= kb.collapse_priority() {
        (a, b)
    } else {
        (b, a)
    };
    let ks = mesh[survivor].kind();
    let kr = mesh[removed].kind();
    let new_position = if ks.is_position_fixed() {
        mesh.vertex_position(survivor)
    } else if ks == VertexKind::OpenBook && kr == VertexKind::Manifold {
        mesh.vertex_position(survivor)
    } else {
        (mesh.vertex_position(survivor) + mesh.vertex_position(removed)) * 0.5
    };

    // Drop the faces sharing both endpoints; this also removes `e` once its
    // halfedge list drains.
    for f in mesh.edge_faces(e) {
        mesh.remove_face(f)?;
    }

    // Redirect everything that referenced the removed vertex to the
    // survivor: halfedge targets first, then the edge keys.
    let removed_edges: SVec<EdgeId> = mesh.incident_edges(removed).iter().copied().collect();
    for re in removed_edges {
        let members = mesh[re].halfedges().to_vec();
        for h in &members {
            if mesh[*h].vertex() == Some(removed) {
                mesh[*h].vertex = Some(survivor);
            }
        }

        let (p, q) = mesh[re].endpoints;
        let np = if p == removed { survivor } else { p };
        let nq = if q == removed { survivor } else { q };
        if np == nq {
            // Can only happen for the collapsed edge itself, which is
            // already gone
            continue;
        }
        let old_key = MeshConnectivity::canonical_pair(p, q);
        let new_key = MeshConnectivity::canonical_pair(np, nq);

        if let Some(&existing) = mesh.edge_map.get(&new_key) {
            // The rings around the collapsed faces close up: (removed, o)
            // merges into the surviving (survivor, o) edge.
            let moved = mesh.edges[re].halfedges.clone();
            for &h in &moved {
                mesh.halfedges[h].edge = Some(existing);
                mesh.edges[existing].halfedges.push(h);
            }
            mesh.edges[re].halfedges.clear();
            mesh.remove_edge(re);
            mesh.pair_twins(existing);
            mesh.update_edge_length(existing);
            mesh.classify_edge(existing);
        } else {
            mesh.edge_map.remove(&old_key);
            mesh.edges[re].endpoints = new_key;
            mesh.edge_map.insert(new_key, re);
            mesh.vertex_edges[survivor].push(re);
            mesh.pair_twins(re);
            mesh.classify_edge(re);
        }
    }

    let removed_mark = mesh[removed].marked;
    mesh.remove_vertex(removed);
    mesh[survivor].marked |= removed_mark;
    mesh[survivor].position = new_position;
    mesh.update_vertex_edge_lengths(survivor);
    mesh.fix_vertex_halfedge(survivor);

    let mut to_classify = mesh.vertex_neighbors(survivor);
    to_classify.push(survivor);
    for v in to_classify {
        if mesh.vertex_exists(v) {
            mesh.classify_vertex(v);
        }
    }

    Ok(survivor)
}

/* =========== */
/*  Edge flip  */
/* =========== */

/// Flips a manifold interior edge, replacing it by the opposite diagonal of
/// the quadrilateral formed by its two triangles. The quad must be convex
/// when projected along the average face normal; near-degenerate turns are
/// rejected rather than committed.
pub fn flip_edge(mesh: &mut MeshConnectivity, e: EdgeId) -> Result<()> {
    if mesh[e].kind() != EdgeKind::Manifold {
        return Err(OpRejection::NotFlippable.into());
    }
    let members: SVec<HalfEdgeId> = mesh[e].halfedges().iter().copied().collect();
    if members.len() != 2 {
        return Err(OpRejection::NotFlippable.into());
    }
    let h_ab = members[0];
    let h_ba = members[1];
    if mesh[h_ab].twin() != Some(h_ba) {
        return Err(OpRejection::MissingNeighbor.into());
    }

    let (va, vb) = mesh.at_halfedge(h_ab).src_dst_pair()?;
    if mesh.incident_edges(va).len() <= 1 || mesh.incident_edges(vb).len() <= 1 {
        return Err(OpRejection::NotFlippable.into());
    }

    let f0 = mesh
        .at_halfedge(h_ab)
        .face()
        .try_end()
        .map_err(|_| OpRejection::MissingNeighbor)?;
    let f1 = mesh
        .at_halfedge(h_ba)
        .face()
        .try_end()
        .map_err(|_| OpRejection::MissingNeighbor)?;

    // f0 is (a, b, c); f1 is (b, a, d)
    let h_bc = mesh[h_ab].next().ok_or(OpRejection::MissingNeighbor)?;
    let h_ca = mesh[h_ab].prev().ok_or(OpRejection::MissingNeighbor)?;
    let h_ad = mesh[h_ba].next().ok_or(OpRejection::MissingNeighbor)?;
    let h_db = mesh[h_ba].prev().ok_or(OpRejection::MissingNeighbor)?;

    let vc = mesh[h_bc].vertex().ok_or(OpRejection::MissingNeighbor)?;
    let vd = mesh[h_ad].vertex().ok_or(OpRejection::MissingNeighbor)?;
    if vc == vd || mesh.edge_between(vc, vd).is_some() {
        return Err(OpRejection::NotFlippable.into());
    }

    let pa = mesh.vertex_position(va);
    let pb = mesh.vertex_position(vb);
    let pc = mesh.vertex_position(vc);
    let pd = mesh.vertex_position(vd);

    let n0 = (pb - pa).cross(pc - pa);
    let n1 = (pa - pb).cross(pd - pb);
    let normal = n0 + n1;
    if normal.length_squared() <= AREA_EPSILON * AREA_EPSILON {
        return Err(OpRejection::NonConvexQuad.into());
    }
    let normal = normal.normalize();

    // The quad perimeter in face-winding order is a -> d -> b -> c; the two
    // diagonals must separate the opposite vertex pairs.
    if !is_convex_quad([pa, pd, pb, pc], normal) {
        return Err(OpRejection::NonConvexQuad.into());
    }

    // Rewire in place: h_ab becomes d -> c, h_ba becomes c -> d.
    mesh[h_ab].vertex = Some(vc);
    mesh[h_ba].vertex = Some(vd);

    // New f0 loop: (d -> c), (c -> a), (a -> d)
    mesh[h_ab].next = Some(h_ca);
    mesh[h_ca].next = Some(h_ad);
    mesh[h_ad].next = Some(h_ab);
    mesh[h_ab].prev = Some(h_ad);
    mesh[h_ca].prev = Some(h_ab);
    mesh[h_ad].prev = Some(h_ca);
    mesh[h_ad].face = Some(f0);

    // New f1 loop: (c -> d), (d -> b), (b -> c)
    mesh[h_ba].next = Some(h_db);
    mesh[h_db].next = Some(h_bc);
    mesh[h_bc].next = Some(h_ba);
    mesh[h_ba].prev = Some(h_bc);
    mesh[h_db].prev = Some(h_ba);
    mesh[h_bc].prev = Some(h_db);
    mesh[h_bc].face = Some(f1);

    mesh[f0].halfedge = Some(h_ab);
    mesh[f1].halfedge = Some(h_ba);

    // Re-key the edge from (a, b) to (c, d)
    let old_key = MeshConnectivity::canonical_pair(va, vb);
    let new_key = MeshConnectivity::canonical_pair(vc, vd);
    mesh.edge_map.remove(&old_key);
    mesh.vertex_edges[va].retain(|&mut x| x != e);
    mesh.vertex_edges[vb].retain(|&mut x| x != e);
    mesh.edges[e].endpoints = new_key;
    mesh.edge_map.insert(new_key, e);
    mesh.vertex_edges[vc].push(e);
    mesh.vertex_edges[vd].push(e);
    mesh.update_edge_length(e);
    mesh.pair_twins(e);

    for v in [va, vb, vc, vd] {
        mesh.fix_vertex_halfedge(v);
        mesh.classify_vertex(v);
    }

    Ok(())
}

/// An edge satisfies the local Delaunay condition iff the two angles opposite
/// to it sum to at most pi. Non-manifold and boundary edges are trivially
/// Delaunay: there is no well-defined opposite pair to test.
pub fn is_delaunay(mesh: &MeshConnectivity, e: EdgeId) -> bool {
    let members = mesh[e].halfedges();
    if members.len() != 2 {
        return true;
    }
    let h0 = members[0];
    let h1 = members[1];
    let (opposite_0, opposite_1) = match (
        mesh.at_halfedge(h0).next().vertex().try_end(),
        mesh.at_halfedge(h1).next().vertex().try_end(),
    ) {
        (Ok(c), Ok(d)) => (c, d),
        _ => return true,
    };
    let (a, b) = mesh.edge_endpoints(e);
    let pa = mesh.vertex_position(a);
    let pb = mesh.vertex_position(b);
    let pc = mesh.vertex_position(opposite_0);
    let pd = mesh.vertex_position(opposite_1);

    let angle_sum = corner_angle(pc, pa, pb) + corner_angle(pd, pa, pb);
    angle_sum <= std::f32::consts::PI + 1e-5
}

/// Repeatedly scans all edges, flipping flippable non-Delaunay ones, until a
/// full pass changes nothing or the scan cap (10x the edge count) is hit.
/// Returns the number of flips performed.
#[profiling::function]
pub fn delaunay_pass(mesh: &mut MeshConnectivity) -> Result<usize> {
    let scan_cap = mesh.num_edges().saturating_mul(10);
    let mut scanned = 0usize;
    let mut total_flips = 0;

    loop {
        let mut flips_this_pass = 0;
        let edges: Vec<EdgeId> = mesh.iter_edges().map(|(id, _)| id).collect();
        for e in edges {
            scanned += 1;
            if scanned > scan_cap {
                return Ok(total_flips);
            }
            if mesh.edge(e).is_none() || mesh[e].kind() != EdgeKind::Manifold {
                continue;
            }
            if is_delaunay(mesh, e) {
                continue;
            }
            match flip_edge(mesh, e) {
                Ok(()) => flips_this_pass += 1,
                Err(err) if is_rejection(&err) => {}
                Err(err) => return Err(err),
            }
        }
        total_flips += flips_this_pass;
        if flips_this_pass == 0 {
            break;
        }
    }
    Ok(total_flips)
}

/* ====================== */
/*  Tangential smoothing  */
/* ====================== */

/// Moves one vertex towards the centroid of its 1-ring, projected onto the
/// tangent plane of the area-weighted vertex normal and damped by `damping`.
/// Open-book vertices are pulled back onto their skeleton segment; branching
/// vertices do not move. Returns whether the vertex moved.
pub fn smooth_vertex(
    mesh: &mut MeshConnectivity,
    skeleton: &Skeleton,
    v: VertexId,
    damping: f32,
) -> Result<bool> {
    let kind = mesh[v].kind();
    if kind.is_position_fixed() {
        return Ok(false);
    }
    let neighbors = mesh.vertex_neighbors(v);
    if neighbors.is_empty() {
        return Ok(false);
    }

    let p = mesh.vertex_position(v);
    let centroid = neighbors
        .iter()
        .fold(Vec3::ZERO, |acc, &n| acc + mesh.vertex_position(n))
        / neighbors.len() as f32;

    // Area-weighted average normal: the raw cross products already carry the
    // area weighting.
    let faces = mesh.vertex_faces(v);
    let mut normal = Vec3::ZERO;
    for &f in &faces {
        if let Some([x, y, z]) = mesh.face_positions(f) {
            normal += (y - x).cross(z - x);
        }
    }

    let target = if normal.length_squared() > AREA_EPSILON * AREA_EPSILON {
        let n = normal.normalize();
        centroid - n * n.dot(centroid - p)
    } else {
        centroid
    };

    let mut candidate = lerp(p, target, damping);

    if kind == VertexKind::OpenBook {
        let projection = match skeleton.segment_for_vertex(v) {
            Some(segment) => skeleton
                .project_onto_segment(mesh, segment, candidate)
                .or_else(|| skeleton.project_point(mesh, candidate)),
            None => skeleton.project_point(mesh, candidate),
        };
        match projection {
            Some(proj) => candidate = proj.position,
            None => return Ok(false),
        }
    }

    if candidate.distance_squared(p) == 0.0 {
        return Ok(false);
    }

    // Reject relocations that would collapse an incident face
    for &f in &faces {
        let vs = mesh.face_vertices(f);
        if vs.len() != 3 {
            continue;
        }
        let pos = |vid: VertexId| {
            if vid == v {
                candidate
            } else {
                mesh.vertex_position(vid)
            }
        };
        if triangle_area(pos(vs[0]), pos(vs[1]), pos(vs[2])) <= AREA_EPSILON {
            return Err(OpRejection::RelocationInvalid.into());
        }
    }

    mesh.set_vertex_position(v, candidate);
    Ok(true)
}

/// One smoothing sweep over all manifold and open-book vertices. Rejections
/// leave the vertex in place and do not fail the sweep. Returns how many
/// vertices moved.
#[profiling::function]
pub fn smooth_pass(mesh: &mut MeshConnectivity, skeleton: &Skeleton, damping: f32) -> usize {
    let candidates: Vec<VertexId> = mesh
        .iter_vertices()
        .filter(|(_, vx)| {
            matches!(vx.kind(), VertexKind::Manifold | VertexKind::OpenBook)
        })
        .map(|(id, _)| id)
        .collect();

    let mut moved = 0;
    for v in candidates {
        match smooth_vertex(mesh, skeleton, v, damping) {
            Ok(true) => moved += 1,
            Ok(false) => {}
            Err(err) if is_rejection(&err) => {}
            Err(err) => {
                log::warn!("smoothing failed at {v:?}: {err}");
            }
        }
    }
    moved
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::mesh::halfedge::test::{single_triangle, two_triangle_quad};
    use crate::mesh::halfedge::validation::validate_topology;

    fn euler(mesh: &MeshConnectivity) -> i64 {
        mesh.num_vertices() as i64 - mesh.num_edges() as i64 + mesh.num_faces() as i64
    }

    pub fn hexagon_fan() -> MeshConnectivity {
        let mut positions = vec![Vec3::ZERO];
        for i in 0..6 {
            let angle = i as f32 * std::f32::consts::TAU / 6.0;
            positions.push(Vec3::new(angle.cos(), angle.sin(), 0.0));
        }
        let mut indices = vec![];
        for i in 0..6u32 {
            indices.extend([0, 1 + i, 1 + (i + 1) % 6]);
        }
        MeshConnectivity::from_buffers(&positions, &indices).unwrap()
    }

    /// Triangular bipyramid: poles a, b over the equator triangle (c, d, e).
    fn bipyramid() -> MeshConnectivity {
        let positions = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-0.5, 0.86, 0.0),
            Vec3::new(-0.5, -0.86, 0.0),
        ];
        let indices = [
            0, 2, 3, //
            0, 3, 4, //
            0, 4, 2, //
            1, 3, 2, //
            1, 4, 3, //
            1, 2, 4,
        ];
        MeshConnectivity::from_buffers(&positions, &indices).unwrap()
    }

    #[test]
    fn split_interior_edge_euler_deltas() {
        let mut mesh = two_triangle_quad();
        let diagonal = mesh
            .iter_edges()
            .find(|(_, e)| e.kind() == EdgeKind::Manifold)
            .map(|(id, _)| id)
            .unwrap();

        let (v0, e0, f0) = (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces());
        let chi = euler(&mesh);
        let x = split_edge(&mut mesh, diagonal, 0.5).unwrap();

        assert_eq!(mesh.num_vertices(), v0 + 1);
        assert_eq!(mesh.num_edges(), e0 + 3);
        assert_eq!(mesh.num_faces(), f0 + 2);
        assert_eq!(euler(&mesh), chi);
        assert!(validate_topology(&mesh).is_valid());

        // The midpoint of the unit-square diagonal
        assert!(mesh
            .vertex_position(x)
            .abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-6));
        // Interior vertex, no skeleton edges around it
        assert_eq!(mesh[x].kind(), VertexKind::Manifold);
    }

    #[test]
    fn split_boundary_edge_inherits_kind() {
        let mut mesh = single_triangle();
        let (e, _) = mesh.iter_edges().next().unwrap();
        let (v0, e0, f0) = (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces());

        let x = split_edge(&mut mesh, e, 0.5).unwrap();

        assert_eq!(mesh.num_vertices(), v0 + 1);
        assert_eq!(mesh.num_edges(), e0 + 2);
        assert_eq!(mesh.num_faces(), f0 + 1);
        assert!(validate_topology(&mesh).is_valid());

        // Both halves are boundary edges, so the new vertex is open-book
        assert_eq!(mesh[x].kind(), VertexKind::OpenBook);
    }

    #[test]
    fn split_feature_edge_keeps_feature_halves() {
        let mut mesh = two_triangle_quad();
        let diagonal = mesh
            .iter_edges()
            .find(|(_, e)| e.kind() == EdgeKind::Manifold)
            .map(|(id, _)| id)
            .unwrap();
        let (a, b) = mesh.edge_endpoints(diagonal);
        mesh.mark_feature_edge(a, b).unwrap();

        let x = split_edge(&mut mesh, diagonal, 0.5).unwrap();

        let half_a = mesh.edge_between(a, x).unwrap();
        let half_b = mesh.edge_between(x, b).unwrap();
        assert_eq!(mesh[half_a].kind(), EdgeKind::Feature);
        assert_eq!(mesh[half_b].kind(), EdgeKind::Feature);
        assert_eq!(mesh[x].kind(), VertexKind::OpenBook);
        assert!(validate_topology(&mesh).is_valid());
    }

    #[test]
    fn collapse_fan_spoke() {
        let mut mesh = hexagon_fan();
        let center = mesh
            .iter_vertices()
            .find(|(_, v)| v.kind() == VertexKind::Manifold)
            .map(|(id, _)| id)
            .unwrap();
        let spoke = mesh.incident_edges(center)[0];
        let chi = euler(&mesh);

        let survivor = collapse_edge(&mut mesh, spoke).unwrap();

        // The boundary ring vertex outranks the interior center
        assert_ne!(survivor, center);
        assert!(!mesh.vertex_exists(center));
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(mesh.num_edges(), 9);
        assert_eq!(euler(&mesh), chi);
        assert!(validate_topology(&mesh).is_valid());
    }

    #[test]
    fn collapse_rejects_link_condition_violation() {
        let mut mesh = bipyramid();
        // The equator edges fail the link condition: both poles plus the
        // third equator vertex are common neighbors, but only two faces are
        // shared.
        let equator = mesh
            .iter_edges()
            .find(|(_, edge)| {
                let (a, b) = edge.endpoints();
                mesh.vertex_neighbors(a)
                    .iter()
                    .filter(|&&n| n != b && mesh.vertex_neighbors(b).contains(&n))
                    .count()
                    > 2
            })
            .map(|(id, _)| id)
            .unwrap();

        let err = collapse_edge(&mut mesh, equator).unwrap_err();
        assert_eq!(
            err.downcast_ref::<OpRejection>(),
            Some(&OpRejection::LinkConditionViolated)
        );
        // The mesh is untouched
        assert_eq!(mesh.num_faces(), 6);
        assert!(validate_topology(&mesh).is_valid());
    }

    #[test]
    fn collapse_boundary_edge_takes_midpoint() {
        let mut mesh = hexagon_fan();
        let boundary = mesh
            .iter_edges()
            .find(|(_, e)| e.kind() == EdgeKind::Boundary)
            .map(|(id, _)| id)
            .unwrap();
        let (a, b) = mesh.edge_endpoints(boundary);
        let expected = (mesh.vertex_position(a) + mesh.vertex_position(b)) * 0.5;

        let survivor = collapse_edge(&mut mesh, boundary).unwrap();
        assert!(mesh.vertex_position(survivor).abs_diff_eq(expected, 1e-6));
        assert!(validate_topology(&mesh).is_valid());
    }

    #[test]
    fn flip_quad_diagonal() {
        let mut mesh = two_triangle_quad();
        let diagonal = mesh
            .iter_edges()
            .find(|(_, e)| e.kind() == EdgeKind::Manifold)
            .map(|(id, _)| id)
            .unwrap();
        let (a, b) = mesh.edge_endpoints(diagonal);
        let chi = euler(&mesh);

        flip_edge(&mut mesh, diagonal).unwrap();

        assert!(mesh.edge_between(a, b).is_none());
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_edges(), 5);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(euler(&mesh), chi);
        assert!(validate_topology(&mesh).is_valid());

        // The new diagonal has the flipped length
        let (c, d) = mesh.edge_endpoints(diagonal);
        let expected = mesh.vertex_position(c).distance(mesh.vertex_position(d));
        assert!((mesh[diagonal].length() - expected).abs() < 1e-6);
    }

    #[test]
    fn flip_rejects_boundary_and_skeleton_edges() {
        let mut mesh = two_triangle_quad();
        let boundary = mesh
            .iter_edges()
            .find(|(_, e)| e.kind() == EdgeKind::Boundary)
            .map(|(id, _)| id)
            .unwrap();
        let err = flip_edge(&mut mesh, boundary).unwrap_err();
        assert_eq!(
            err.downcast_ref::<OpRejection>(),
            Some(&OpRejection::NotFlippable)
        );
    }

    #[test]
    fn flip_rejects_non_convex_quad() {
        // A dart: d sits inside triangle (a, b, c), so the quad around the
        // shared edge is not convex.
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.5, 2.0, 0.0),
            Vec3::new(0.5, 0.2, 0.0),
        ];
        let indices = [0, 1, 2, 1, 0, 3];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();
        let shared = mesh
            .iter_edges()
            .find(|(_, e)| e.kind() == EdgeKind::Manifold)
            .map(|(id, _)| id)
            .unwrap();

        let err = flip_edge(&mut mesh, shared).unwrap_err();
        assert_eq!(
            err.downcast_ref::<OpRejection>(),
            Some(&OpRejection::NonConvexQuad)
        );
    }

    #[test]
    fn delaunay_pass_fixes_sliver_diagonal() {
        // Two slivers sharing a long diagonal; the opposite angles are both
        // obtuse, so the shared edge must flip.
        let positions = [
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.2, 0.0),
            Vec3::new(0.0, -0.2, 0.0),
        ];
        let indices = [0, 1, 2, 1, 0, 3];
        let mut mesh = MeshConnectivity::from_buffers(&positions, &indices).unwrap();

        let flips = delaunay_pass(&mut mesh).unwrap();
        assert_eq!(flips, 1);
        assert!(validate_topology(&mesh).is_valid());

        for (e, _) in mesh.iter_edges() {
            assert!(is_delaunay(&mesh, e));
        }
    }

    #[test]
    fn smoothing_pulls_center_toward_ring_centroid() {
        let mut mesh = hexagon_fan();
        let center = mesh
            .iter_vertices()
            .find(|(_, v)| v.kind() == VertexKind::Manifold)
            .map(|(id, _)| id)
            .unwrap();
        // Nudge the center off the ring centroid
        mesh.set_vertex_position(center, Vec3::new(0.3, 0.1, 0.0));
        let skeleton = Skeleton::build(&mesh);

        let moved = smooth_vertex(&mut mesh, &skeleton, center, 0.5).unwrap();
        assert!(moved);
        // The ring centroid is the origin; damping 0.5 halves the offset
        assert!(mesh
            .vertex_position(center)
            .abs_diff_eq(Vec3::new(0.15, 0.05, 0.0), 1e-5));
    }

    #[test]
    fn smoothing_keeps_open_book_vertices_on_the_boundary() {
        let mut mesh = hexagon_fan();
        let skeleton = Skeleton::build(&mesh);
        let ring: Vec<VertexId> = mesh
            .iter_vertices()
            .filter(|(_, v)| v.kind() == VertexKind::OpenBook)
            .map(|(id, _)| id)
            .collect();

        for v in ring {
            let before = mesh.vertex_position(v);
            let _ = smooth_vertex(&mut mesh, &skeleton, v, 0.5);
            let after = mesh.vertex_position(v);
            // Still on the unit hexagon's perimeter: projecting back onto
            // the skeleton keeps boundary vertices on the boundary polyline
            let proj = skeleton.project_point(&mesh, after).unwrap();
            assert!(proj.distance < 1e-5);
            // And the move stayed in the plane
            assert_eq!(after.z, before.z);
        }
    }
}
