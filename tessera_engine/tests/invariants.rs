// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tessera_engine::mesh::halfedge::edit_ops::{
    collapse_edge, delaunay_pass, flip_edge, is_rejection, smooth_pass, split_edge,
};
use tessera_engine::mesh::halfedge::validation::validate_topology;
use tessera_engine::prelude::*;

fn octahedron() -> MeshConnectivity {
    let positions = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, -1.0),
    ];
    let indices = [
        4, 0, 2, 4, 2, 1, 4, 1, 3, 4, 3, 0, //
        5, 2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3,
    ];
    MeshConnectivity::from_buffers(&positions, &indices).unwrap()
}

fn grid(nx: usize, ny: usize) -> MeshConnectivity {
    let mut positions = Vec::new();
    for y in 0..=ny {
        for x in 0..=nx {
            positions.push(Vec3::new(x as f32, y as f32, 0.0));
        }
    }
    let stride = (nx + 1) as u32;
    let mut indices = Vec::new();
    for y in 0..ny as u32 {
        for x in 0..nx as u32 {
            let i = y * stride + x;
            indices.extend([i, i + 1, i + stride + 1]);
            indices.extend([i, i + stride + 1, i + stride]);
        }
    }
    MeshConnectivity::from_buffers(&positions, &indices).unwrap()
}

fn euler(mesh: &MeshConnectivity) -> i64 {
    mesh.num_vertices() as i64 - mesh.num_edges() as i64 + mesh.num_faces() as i64
}

/// Checks the §8-style structural assertions directly, on top of the
/// validator: next/prev closure, twin mutuality, edge membership.
fn assert_structure(mesh: &MeshConnectivity) {
    let report = validate_topology(mesh);
    assert!(report.is_valid(), "validator errors: {:?}", report.errors);

    for (h, halfedge) in mesh.iter_halfedges() {
        let next = halfedge.next().unwrap();
        let prev = halfedge.prev().unwrap();
        assert_eq!(mesh[next].prev(), Some(h));
        assert_eq!(mesh[prev].next(), Some(h));
        if let Some(twin) = halfedge.twin() {
            assert_eq!(mesh[twin].twin(), Some(h));
        }
        let e = halfedge.edge().unwrap();
        assert!(mesh[e].halfedges().contains(&h));
    }

    for (f, face) in mesh.iter_faces() {
        let h0 = face.halfedge().unwrap();
        let h3 = mesh.at_halfedge(h0).next().next().next().end();
        assert_eq!(h3, h0);
        for h in mesh.face_halfedges(f) {
            assert_eq!(mesh[h].face(), Some(f));
        }
    }
}

#[test]
fn splitting_every_edge_of_a_closed_mesh_keeps_euler() {
    let mut mesh = octahedron();
    let chi = euler(&mesh);

    let edges: Vec<EdgeId> = mesh.iter_edges().map(|(e, _)| e).collect();
    for e in edges {
        if mesh.edge(e).is_none() {
            continue;
        }
        split_edge(&mut mesh, e, 0.5).unwrap();
        assert_structure(&mesh);
    }

    // Interior splits preserve the Euler characteristic
    assert_eq!(euler(&mesh), chi);
    // Closed surface stays closed
    assert_eq!(mesh.stats().boundary_edges, 0);
}

#[test]
fn collapse_undoes_a_split_euler_wise() {
    let mut mesh = grid(3, 3);
    let (v0, e0, f0) = (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces());

    // Split an interior manifold edge, then collapse one of the halves
    let interior = mesh
        .iter_edges()
        .find(|(_, e)| e.kind() == EdgeKind::Manifold)
        .map(|(id, _)| id)
        .unwrap();
    let x = split_edge(&mut mesh, interior, 0.5).unwrap();
    assert_eq!(mesh.num_vertices(), v0 + 1);
    assert_eq!(mesh.num_edges(), e0 + 3);
    assert_eq!(mesh.num_faces(), f0 + 2);

    let half = mesh.incident_edges(x)[0];
    collapse_edge(&mut mesh, half).unwrap();
    assert_eq!(mesh.num_vertices(), v0);
    assert_eq!(mesh.num_edges(), e0);
    assert_eq!(mesh.num_faces(), f0);
    assert_structure(&mesh);
}

#[test]
fn flipping_twice_restores_the_counts() {
    let mut mesh = grid(2, 2);
    let chi = euler(&mesh);

    let flippable: Vec<EdgeId> = mesh
        .iter_edges()
        .filter(|(_, e)| e.kind() == EdgeKind::Manifold)
        .map(|(e, _)| e)
        .collect();

    let mut flipped = 0;
    for e in flippable {
        match flip_edge(&mut mesh, e) {
            Ok(()) => {
                flipped += 1;
                assert_structure(&mesh);
                assert_eq!(euler(&mesh), chi);
                // Flip back
                flip_edge(&mut mesh, e).unwrap();
                assert_structure(&mesh);
            }
            Err(err) => assert!(is_rejection(&err)),
        }
    }
    assert!(flipped > 0);
}

#[test]
fn delaunay_then_smooth_preserves_structure() {
    let mut mesh = grid(4, 2);
    delaunay_pass(&mut mesh).unwrap();
    assert_structure(&mesh);

    let skeleton = Skeleton::build(&mesh);
    for _ in 0..3 {
        smooth_pass(&mut mesh, &skeleton, 0.5);
        assert_structure(&mesh);
    }

    // Positions stay finite and in the plane
    for (_, vertex) in mesh.iter_vertices() {
        assert!(vertex.position.is_finite());
        assert!(vertex.position.z.abs() < 1e-6);
    }
}

#[test]
fn classification_is_stable_across_rebuilds() {
    let mut mesh = grid(3, 2);
    let kinds: Vec<VertexKind> = mesh.iter_vertices().map(|(_, v)| v.kind()).collect();
    mesh.classify_all();
    let again: Vec<VertexKind> = mesh.iter_vertices().map(|(_, v)| v.kind()).collect();
    assert_eq!(kinds, again);

    let skeleton_a = Skeleton::build(&mesh);
    let skeleton_b = Skeleton::build(&mesh);
    assert_eq!(skeleton_a.segments().len(), skeleton_b.segments().len());
}
