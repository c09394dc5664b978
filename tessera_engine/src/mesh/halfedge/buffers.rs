// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

/// The interchange representation shared with the host geometry container: a
/// position buffer, a triangle index buffer, and optional per-vertex normal
/// and color attributes.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub positions: Vec<Vec3>,
    /// 3*N indices into `positions` for N triangles.
    pub indices: Vec<u32>,
    pub normals: Option<Vec<Vec3>>,
    pub colors: Option<Vec<Vec3>>,
}

/// Summary counters over a mesh, mostly derived from the classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshStats {
    pub vertices: usize,
    pub edges: usize,
    pub halfedges: usize,
    pub faces: usize,
    pub boundary_edges: usize,
    pub manifold_edges: usize,
    pub feature_edges: usize,
    pub non_manifold_edges: usize,
    pub euler_characteristic: i64,
    pub is_manifold: bool,
    pub has_boundary: bool,
    pub min_edge_length: f32,
    pub max_edge_length: f32,
    pub mean_edge_length: f32,
    pub mean_quality: f32,
}

const COLOR_MANIFOLD: Vec3 = Vec3::new(0.65, 0.65, 0.65);
const COLOR_OPEN_BOOK: Vec3 = Vec3::new(0.2, 0.55, 0.9);
const COLOR_BRANCHING: Vec3 = Vec3::new(0.95, 0.35, 0.2);
const COLOR_OTHER: Vec3 = Vec3::new(0.9, 0.2, 0.9);

fn vertex_kind_color(kind: VertexKind) -> Vec3 {
    match kind {
        VertexKind::Manifold => COLOR_MANIFOLD,
        VertexKind::OpenBook => COLOR_OPEN_BOOK,
        VertexKind::SkeletonBranching => COLOR_BRANCHING,
        VertexKind::NonManifoldOther => COLOR_OTHER,
    }
}

fn quality_color(q: f32) -> Vec3 {
    // red at 0, green at 1
    lerp(Vec3::new(0.9, 0.15, 0.15), Vec3::new(0.15, 0.8, 0.2), q.clamp(0.0, 1.0))
}

impl MeshConnectivity {
    /// Renumbers the live vertices into a compact range and emits shared
    /// vertex buffers. Adjacency is preserved; ids are not.
    #[profiling::function]
    pub fn to_buffers(&self) -> MeshBuffers {
        let (positions, indices, _) = self.compact_vertices();
        MeshBuffers {
            positions,
            indices,
            normals: None,
            colors: None,
        }
    }

    /// Shared vertex buffers plus smooth per-vertex normals (area-weighted
    /// average of the incident face normals).
    pub fn to_buffers_with_normals(&self) -> MeshBuffers {
        let (positions, indices, order) = self.compact_vertices();
        let normals = order
            .iter()
            .map(|&v| self.vertex_normal(v))
            .collect::<Vec<_>>();
        MeshBuffers {
            positions,
            indices,
            normals: Some(normals),
            colors: None,
        }
    }

    /// Shared vertex buffers with a per-vertex color encoding the vertex
    /// classification.
    pub fn classification_color_buffers(&self) -> MeshBuffers {
        let (positions, indices, order) = self.compact_vertices();
        let colors = order
            .iter()
            .map(|&v| vertex_kind_color(self[v].kind()))
            .collect::<Vec<_>>();
        MeshBuffers {
            positions,
            indices,
            normals: None,
            colors: Some(colors),
        }
    }

    /// Flat-shaded buffers (three fresh vertices per triangle) with a color
    /// per triangle encoding its quality.
    pub fn quality_color_buffers(&self) -> MeshBuffers {
        let mut positions = Vec::new();
        let mut colors = Vec::new();
        let mut indices = Vec::new();
        for (f, _) in self.iter_faces() {
            let [a, b, c] = match self.face_positions(f) {
                Some(corners) => corners,
                None => continue,
            };
            let color = quality_color(self.face_quality(f));
            let base = positions.len() as u32;
            positions.extend([a, b, c]);
            colors.extend([color, color, color]);
            indices.extend([base, base + 1, base + 2]);
        }
        MeshBuffers {
            positions,
            indices,
            normals: None,
            colors: Some(colors),
        }
    }

    /// Line-segment positions for the skeleton: two entries (six floats) per
    /// boundary, feature or non-manifold edge.
    pub fn skeleton_line_buffers(&self) -> Vec<Vec3> {
        let mut positions = Vec::new();
        for (_, edge) in self.iter_edges() {
            if edge.kind().is_skeleton() {
                let (a, b) = edge.endpoints();
                positions.push(self.vertex_position(a));
                positions.push(self.vertex_position(b));
            }
        }
        positions
    }

    fn compact_vertices(&self) -> (Vec<Vec3>, Vec<u32>, Vec<VertexId>) {
        let mut v_id_to_idx =
            slotmap::SecondaryMap::<VertexId, u32>::with_capacity(self.num_vertices());
        let mut positions = Vec::with_capacity(self.num_vertices());
        let mut order = Vec::with_capacity(self.num_vertices());
        for (idx, (v, vertex)) in self.iter_vertices().enumerate() {
            v_id_to_idx.insert(v, idx as u32);
            positions.push(vertex.position);
            order.push(v);
        }

        let mut indices = Vec::with_capacity(self.num_faces() * 3);
        for (f, _) in self.iter_faces() {
            let vs = self.face_vertices(f);
            if vs.len() != 3 {
                continue;
            }
            for &v in &vs {
                indices.push(v_id_to_idx[v]);
            }
        }
        (positions, indices, order)
    }

    /// Area-weighted vertex normal; zero for isolated vertices.
    pub fn vertex_normal(&self, v: VertexId) -> Vec3 {
        let mut normal = Vec3::ZERO;
        for f in self.vertex_faces(v) {
            if let Some([a, b, c]) = self.face_positions(f) {
                normal += (b - a).cross(c - a);
            }
        }
        normal.normalize_or_zero()
    }

    /// Center and size of the axis-aligned bounding box.
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for (_, vertex) in self.iter_vertices() {
            min = min.min(vertex.position);
            max = max.max(vertex.position);
        }
        if self.num_vertices() == 0 {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        ((min + max) * 0.5, max - min)
    }

    pub fn mean_edge_length(&self) -> f32 {
        if self.num_edges() == 0 {
            return 0.0;
        }
        let total: f32 = self.iter_edges().map(|(_, e)| e.length()).sum();
        total / self.num_edges() as f32
    }

    pub fn mean_triangle_quality(&self) -> f32 {
        if self.num_faces() == 0 {
            return 0.0;
        }
        let total: f32 = self.iter_faces().map(|(f, _)| self.face_quality(f)).sum();
        total / self.num_faces() as f32
    }

    pub fn total_area(&self) -> f32 {
        self.iter_faces().map(|(f, _)| self.face_area(f)).sum()
    }

    #[profiling::function]
    pub fn stats(&self) -> MeshStats {
        let mut stats = MeshStats {
            vertices: self.num_vertices(),
            edges: self.num_edges(),
            halfedges: self.num_halfedges(),
            faces: self.num_faces(),
            euler_characteristic: self.num_vertices() as i64 - self.num_edges() as i64
                + self.num_faces() as i64,
            min_edge_length: f32::MAX,
            ..Default::default()
        };

        for (_, edge) in self.iter_edges() {
            match edge.kind() {
                EdgeKind::Boundary => stats.boundary_edges += 1,
                EdgeKind::Manifold => stats.manifold_edges += 1,
                EdgeKind::Feature => stats.feature_edges += 1,
                EdgeKind::NonManifold => stats.non_manifold_edges += 1,
            }
            stats.min_edge_length = stats.min_edge_length.min(edge.length());
            stats.max_edge_length = stats.max_edge_length.max(edge.length());
        }
        if self.num_edges() == 0 {
            stats.min_edge_length = 0.0;
        }
        stats.mean_edge_length = self.mean_edge_length();
        stats.mean_quality = self.mean_triangle_quality();
        stats.is_manifold = stats.non_manifold_edges == 0;
        stats.has_boundary = stats.boundary_edges > 0;
        stats
    }
}
