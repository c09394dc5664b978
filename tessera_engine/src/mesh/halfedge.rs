// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

use glam::Vec3;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;

/// Implements indexing traits so the mesh data structure can be used to access
/// vertex, edge, face or halfedge information using ids as indices.
pub mod mesh_index_impls;

/// Type-safe wrappers over the internal allocator indices used as pointers
pub mod id_types;
pub use id_types::*;

/// An API to represent type-safe and error-handled graph traversals over a mesh
pub mod traversals;
pub use traversals::*;

/// Edge and vertex classification from incident-face and skeleton-edge counts
pub mod classify;

/// The skeleton: segments of boundary / feature / non-manifold edges
pub mod skeleton;
pub use skeleton::{Skeleton, SkeletonProjection, SkeletonSegment};

/// Local topological operators: split, collapse, flip, tangential smoothing
pub mod edit_ops;

/// Structural invariant checks over the connectivity store
pub mod validation;
pub use validation::{validate_topology, TopologyIssue, ValidationReport};

/// Import / export of vertex-buffer + index-buffer geometry, including the
/// classification, quality and skeleton visualization variants
pub mod buffers;
pub use buffers::*;

/// HalfEdge meshes are a type of linked list. This means it is sometimes
/// impossible to ensure some algorithms will terminate when the mesh is
/// malformed. To ensure the code never goes into an infinite loop, this max
/// number of iterations will be performed before giving an error.
pub const MAX_LOOP_ITERATIONS: usize = 8196;

/// Classification of an undirected edge by its incident-face count. `Feature`
/// marks user-flagged edges among the two-face ones and dominates `Manifold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Exactly two incident faces
    Manifold,
    /// More than two incident faces
    NonManifold,
    /// Two incident faces, marked by the user as a feature to preserve
    Feature,
    /// Exactly one incident face
    Boundary,
}

impl EdgeKind {
    /// Skeleton edges are everything that constrains remeshing: boundary,
    /// feature and non-manifold edges.
    pub fn is_skeleton(self) -> bool {
        matches!(
            self,
            EdgeKind::Boundary | EdgeKind::Feature | EdgeKind::NonManifold
        )
    }
}

/// Classification of a vertex by the number of incident skeleton edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    /// No incident skeleton edge. Free to move on the surface.
    Manifold,
    /// Exactly two incident skeleton edges. May slide along its skeleton
    /// segment.
    OpenBook,
    /// One, or more than two, incident skeleton edges. Position-fixed.
    SkeletonBranching,
    /// Reserved for configurations the classifier cannot express.
    NonManifoldOther,
}

impl VertexKind {
    /// Vertices that must not be relocated by smoothing or collapse.
    pub fn is_position_fixed(self) -> bool {
        matches!(
            self,
            VertexKind::SkeletonBranching | VertexKind::NonManifoldOther
        )
    }

    /// Priority when choosing the surviving endpoint of a collapse.
    pub(crate) fn collapse_priority(self) -> u8 {
        match self {
            VertexKind::SkeletonBranching | VertexKind::NonManifoldOther => 2,
            VertexKind::OpenBook => 1,
            VertexKind::Manifold => 0,
        }
    }
}

/// A directed halfedge. The source vertex is implicit: it is the target of
/// `prev`.
#[derive(Debug, Default, Clone)]
pub struct HalfEdge {
    /// Target vertex
    vertex: Option<VertexId>,
    /// Parent undirected edge
    edge: Option<EdgeId>,
    /// The face this halfedge bounds. Only dangling mid-operation.
    face: Option<FaceId>,
    next: Option<HalfEdgeId>,
    prev: Option<HalfEdgeId>,
    /// The opposite-direction partner, when the direction bags pair up.
    /// Halfedges on boundary edges and the leftovers of non-manifold edges
    /// have none, and every traversal must tolerate that.
    twin: Option<HalfEdgeId>,
}

impl HalfEdge {
    pub fn vertex(&self) -> Option<VertexId> {
        self.vertex
    }
    pub fn edge(&self) -> Option<EdgeId> {
        self.edge
    }
    pub fn face(&self) -> Option<FaceId> {
        self.face
    }
    pub fn next(&self) -> Option<HalfEdgeId> {
        self.next
    }
    pub fn prev(&self) -> Option<HalfEdgeId> {
        self.prev
    }
    pub fn twin(&self) -> Option<HalfEdgeId> {
        self.twin
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub position: Vec3,
    halfedge: Option<HalfEdgeId>,
    kind: VertexKind,
    /// Set for endpoints of user-marked feature edges.
    pub marked: bool,
}

impl Vertex {
    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
    pub fn kind(&self) -> VertexKind {
        self.kind
    }
}

/// An undirected edge. Unlike the classical halfedge structure, an edge owns
/// the full list of halfedges running along it, so more than two incident
/// faces are representable.
#[derive(Debug, Clone)]
pub struct Edge {
    halfedges: SVec<HalfEdgeId>,
    /// Representative halfedge used to start traversals. Always a member of
    /// `halfedges`.
    halfedge: Option<HalfEdgeId>,
    /// Canonically ordered endpoints (smaller id first).
    endpoints: (VertexId, VertexId),
    /// Cached intrinsic length.
    length: f32,
    kind: EdgeKind,
}

impl Edge {
    pub fn halfedges(&self) -> &[HalfEdgeId] {
        &self.halfedges
    }
    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
    pub fn endpoints(&self) -> (VertexId, VertexId) {
        self.endpoints
    }
    pub fn length(&self) -> f32 {
        self.length
    }
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }
}

/// A triangular face. The other two halfedges are reachable via `next`.
#[derive(Debug, Clone)]
pub struct Face {
    halfedge: Option<HalfEdgeId>,
}

impl Face {
    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
}

/// Import validation failures. These surface before any element is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MalformedInput {
    /// The index buffer length is not divisible by 3
    NonTriangular(usize),
    /// An index points past the end of the position buffer
    IndexOutOfRange { index: u32, vertex_count: usize },
    /// A position contains NaN or infinity
    PositionNotFinite(usize),
}

impl std::fmt::Display for MalformedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedInput::NonTriangular(len) => {
                write!(f, "index buffer length {len} is not divisible by 3")
            }
            MalformedInput::IndexOutOfRange {
                index,
                vertex_count,
            } => write!(f, "index {index} out of range for {vertex_count} vertices"),
            MalformedInput::PositionNotFinite(i) => {
                write!(f, "position {i} is not finite")
            }
        }
    }
}
impl std::error::Error for MalformedInput {}

/// The connectivity store: four arenas of mesh elements plus the lookup
/// indices used to resolve edges by endpoint pair and to enumerate the edges
/// around a vertex. All cross-references between elements are ids into the
/// arenas.
#[derive(Debug, Clone, Default)]
pub struct MeshConnectivity {
    vertices: SlotMap<VertexId, Vertex>,
    edges: SlotMap<EdgeId, Edge>,
    halfedges: SlotMap<HalfEdgeId, HalfEdge>,
    faces: SlotMap<FaceId, Face>,

    edge_map: HashMap<(VertexId, VertexId), EdgeId>,
    vertex_edges: SecondaryMap<VertexId, SVec<EdgeId>>,
}

impl MeshConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn iter_vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn iter_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    pub fn iter_halfedges(&self) -> impl Iterator<Item = (HalfEdgeId, &HalfEdge)> {
        self.halfedges.iter()
    }

    pub fn iter_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces.iter()
    }

    /* ======================== */
    /*  Low-level construction  */
    /* ======================== */

    /// Adds a new vertex to the mesh, disconnected from everything else.
    /// Returns its handle.
    pub fn alloc_vertex(&mut self, position: Vec3) -> VertexId {
        let v = self.vertices.insert(Vertex {
            position,
            halfedge: None,
            kind: VertexKind::Manifold,
            marked: false,
        });
        self.vertex_edges.insert(v, SVec::new());
        v
    }

    fn alloc_face(&mut self, halfedge: Option<HalfEdgeId>) -> FaceId {
        self.faces.insert(Face { halfedge })
    }

    fn alloc_halfedge(&mut self, halfedge: HalfEdge) -> HalfEdgeId {
        self.halfedges.insert(halfedge)
    }

    /// Removes a vertex. The caller must have detached all incident edges
    /// beforehand; lookup entries are dropped here.
    pub(crate) fn remove_vertex(&mut self, vertex: VertexId) {
        self.vertex_edges.remove(vertex);
        self.vertices.remove(vertex);
    }

    /// Removes an edge together with its lookup entries. The caller must have
    /// emptied its halfedge list beforehand.
    pub(crate) fn remove_edge(&mut self, edge: EdgeId) {
        if let Some(edge_data) = self.edges.remove(edge) {
            self.edge_map.remove(&edge_data.endpoints);
            let (a, b) = edge_data.endpoints;
            if let Some(list) = self.vertex_edges.get_mut(a) {
                list.retain(|&mut e| e != edge);
            }
            if a != b {
                if let Some(list) = self.vertex_edges.get_mut(b) {
                    list.retain(|&mut e| e != edge);
                }
            }
        }
    }

    pub(crate) fn canonical_pair(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
        if b < a {
            (b, a)
        } else {
            (a, b)
        }
    }

    /// The undirected edge joining `a` and `b`, if one exists.
    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.edge_map.get(&Self::canonical_pair(a, b)).copied()
    }

    fn resolve_or_create_edge(&mut self, a: VertexId, b: VertexId) -> EdgeId {
        let key = Self::canonical_pair(a, b);
        if let Some(&e) = self.edge_map.get(&key) {
            return e;
        }
        let length = self.vertices[a].position.distance(self.vertices[b].position);
        let e = self.edges.insert(Edge {
            halfedges: SVec::new(),
            halfedge: None,
            endpoints: key,
            length,
            kind: EdgeKind::Manifold,
        });
        self.edge_map.insert(key, e);
        self.vertex_edges[key.0].push(e);
        if key.0 != key.1 {
            self.vertex_edges[key.1].push(e);
        }
        e
    }

    /// Creates a triangular face over three existing vertices, resolving or
    /// creating the three undirected edges, appending one halfedge per edge,
    /// and wiring the next/prev 3-cycle. Twins are re-paired and edges
    /// reclassified for all three edges. Vertex classification is left to the
    /// caller, which usually batches it.
    pub fn add_triangle(&mut self, a: VertexId, b: VertexId, c: VertexId) -> Result<FaceId> {
        for v in [a, b, c] {
            if !self.vertices.contains_key(v) {
                bail!("add_triangle: vertex {v:?} does not exist");
            }
        }

        let f = self.alloc_face(None);
        let corners = [(a, b), (b, c), (c, a)];
        let mut hs = SVecN::<HalfEdgeId, 3>::new();

        for (src, dst) in corners {
            let e = self.resolve_or_create_edge(src, dst);
            let h = self.alloc_halfedge(HalfEdge {
                vertex: Some(dst),
                edge: Some(e),
                face: Some(f),
                ..Default::default()
            });
            self.edges[e].halfedges.push(h);
            // The representative is the last halfedge added
            self.edges[e].halfedge = Some(h);
            hs.push(h);
        }

        for i in 0..3 {
            self.halfedges[hs[i]].next = Some(hs[(i + 1) % 3]);
            self.halfedges[hs[i]].prev = Some(hs[(i + 2) % 3]);
        }
        self.faces[f].halfedge = Some(hs[0]);

        let sources = [a, b, c];
        for (i, &v) in sources.iter().enumerate() {
            if self.vertices[v].halfedge.is_none() {
                self.vertices[v].halfedge = Some(hs[i]);
            }
        }

        for (src, dst) in corners {
            let e = self
                .edge_between(src, dst)
                .expect("edge was just resolved");
            self.pair_twins(e);
            self.classify_edge(e);
        }

        Ok(f)
    }

    /// Re-pairs the twins of all halfedges on `edge`. Halfedges are
    /// partitioned by direction into two bags and paired positionally; the
    /// leftovers of the larger bag stay twinless. Self-loop edges (from
    /// degenerate faces) are left entirely twinless.
    pub(crate) fn pair_twins(&mut self, edge: EdgeId) {
        let (va, vb) = self.edges[edge].endpoints;
        let members = self.edges[edge].halfedges.clone();

        let mut forward = SVec::new();
        let mut backward = SVec::new();
        for &h in &members {
            self.halfedges[h].twin = None;
            match self.halfedges[h].vertex {
                Some(v) if v == vb => forward.push(h),
                Some(v) if v == va => backward.push(h),
                _ => {}
            }
        }
        if va == vb {
            return;
        }
        for (&hf, &hb) in forward.iter().zip(backward.iter()) {
            self.halfedges[hf].twin = Some(hb);
            self.halfedges[hb].twin = Some(hf);
        }
    }

    /// Removes a face and every piece of connectivity that only existed to
    /// support it: its halfedges are detached from their edges, edges left
    /// with no halfedge are dropped, survivors get their representative,
    /// twins and classification refreshed. Vertices are never removed here,
    /// but their outgoing-halfedge pointers and classification are fixed up.
    pub fn remove_face(&mut self, face: FaceId) -> Result<()> {
        let hs = self.at_face(face).halfedges()?;

        let mut sources = SVecN::<VertexId, 3>::new();
        let mut affected_edges = SVec::<EdgeId>::new();
        for &h in &hs {
            if let Some(src) = self.halfedge_src(h) {
                sources.push(src);
            }
            if let Some(e) = self.halfedges[h].edge {
                affected_edges.push(e);
            }
        }

        for &h in &hs {
            if let Some(e) = self.halfedges[h].edge {
                self.edges[e].halfedges.retain(|&mut m| m != h);
            }
        }

        affected_edges.sort_unstable();
        affected_edges.dedup();

        let mut affected_vertices = SVec::<VertexId>::new();
        for &e in &affected_edges {
            let (a, b) = self.edges[e].endpoints;
            affected_vertices.push(a);
            affected_vertices.push(b);
            if self.edges[e].halfedges.is_empty() {
                self.remove_edge(e);
            } else {
                let rep_ok = self.edges[e]
                    .halfedge
                    .map(|rep| self.edges[e].halfedges.contains(&rep))
                    .unwrap_or(false);
                if !rep_ok {
                    self.edges[e].halfedge = self.edges[e].halfedges.last().copied();
                }
                self.pair_twins(e);
                self.classify_edge(e);
            }
        }

        for &h in &hs {
            self.halfedges.remove(h);
        }
        self.faces.remove(face);

        sources.sort_unstable();
        sources.dedup();
        for v in sources {
            self.fix_vertex_halfedge(v);
        }

        affected_vertices.sort_unstable();
        affected_vertices.dedup();
        for v in affected_vertices {
            if self.vertices.contains_key(v) {
                self.classify_vertex(v);
            }
        }

        Ok(())
    }

    /// Reverses the winding of one face: every halfedge in its loop swaps
    /// direction, and next/prev run the cycle backwards. Twins on the
    /// touched edges are re-paired afterwards.
    pub fn reverse_face_orientation(&mut self, face: FaceId) {
        let hs = self.face_halfedges(face);
        let n = hs.len();
        let targets: SVec<Option<VertexId>> =
            hs.iter().map(|&h| self.halfedges[h].vertex).collect();

        let mut affected_edges = SVec::<EdgeId>::new();
        let mut affected_vertices = SVec::<VertexId>::new();
        for i in 0..n {
            let h = hs[i];
            // The old source becomes the new target
            let source = targets[(i + n - 1) % n];
            let old_next = self.halfedges[h].next;
            let old_prev = self.halfedges[h].prev;
            self.halfedges[h].vertex = source;
            self.halfedges[h].next = old_prev;
            self.halfedges[h].prev = old_next;
            if let Some(e) = self.halfedges[h].edge {
                affected_edges.push(e);
            }
            if let Some(v) = targets[i] {
                affected_vertices.push(v);
            }
        }

        affected_edges.sort_unstable();
        affected_edges.dedup();
        for e in affected_edges {
            self.pair_twins(e);
        }
        for v in affected_vertices {
            self.fix_vertex_halfedge(v);
        }
    }

    /// Ensures the vertex's outgoing halfedge pointer refers to a live
    /// halfedge whose source is the vertex, repointing or clearing it.
    pub(crate) fn fix_vertex_halfedge(&mut self, v: VertexId) {
        if !self.vertices.contains_key(v) {
            return;
        }
        let current_ok = self.vertices[v]
            .halfedge
            .map(|h| self.halfedges.contains_key(h) && self.halfedge_src(h) == Some(v))
            .unwrap_or(false);
        if !current_ok {
            self.vertices[v].halfedge = self.outgoing_halfedges(v).first().copied();
        }
    }

    /* ============== */
    /*  Mesh queries  */
    /* ============== */

    /// The source vertex of a halfedge: the target of its `prev`.
    pub fn halfedge_src(&self, h: HalfEdgeId) -> Option<VertexId> {
        let prev = self.halfedges.get(h)?.prev?;
        self.halfedges.get(prev)?.vertex
    }

    /// The target vertex of a halfedge.
    pub fn halfedge_dst(&self, h: HalfEdgeId) -> Option<VertexId> {
        self.halfedges.get(h)?.vertex
    }

    /// All edges incident to a vertex, in insertion order.
    pub fn incident_edges(&self, v: VertexId) -> &[EdgeId] {
        self.vertex_edges
            .get(v)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// All halfedges whose source is `v`. This walks the incident-edge index
    /// rather than the twin-next fan, so it stays correct around twinless
    /// non-manifold halfedges.
    pub fn outgoing_halfedges(&self, v: VertexId) -> SVec<HalfEdgeId> {
        let mut result = SVec::new();
        for &e in self.incident_edges(v) {
            for &h in self.edges[e].halfedges.iter() {
                if self.halfedge_src(h) == Some(v) {
                    result.push(h);
                }
            }
        }
        result
    }

    /// The 1-ring vertex neighborhood of `v`: the other endpoint of every
    /// incident edge.
    pub fn vertex_neighbors(&self, v: VertexId) -> SVec<VertexId> {
        let mut result = SVec::new();
        for &e in self.incident_edges(v) {
            let (a, b) = self.edges[e].endpoints;
            let other = if a == v { b } else { a };
            if other != v {
                result.push(other);
            }
        }
        result
    }

    /// The distinct faces incident to a vertex.
    pub fn vertex_faces(&self, v: VertexId) -> SVec<FaceId> {
        let mut result = SVec::new();
        for h in self.outgoing_halfedges(v) {
            if let Some(f) = self.halfedges[h].face {
                if !result.contains(&f) {
                    result.push(f);
                }
            }
        }
        result
    }

    /// Returns the halfedges of a given face
    pub fn face_halfedges(&self, face_id: FaceId) -> SVec<HalfEdgeId> {
        let mut edges = SmallVec::new();
        let h0 = self[face_id].halfedge.expect("Face should have a halfedge");
        let mut h = h0;

        edges.push(h);

        let mut counter = 0;
        loop {
            if counter > MAX_LOOP_ITERATIONS {
                panic!("Max number of iterations reached. Is the mesh malformed?");
            }
            counter += 1;

            h = self[h]
                .next
                .unwrap_or_else(|| panic!("Halfedge {h:?} has no next"));
            if h == h0 {
                break;
            }
            edges.push(h);
        }

        edges
    }

    pub fn face_vertices(&self, face_id: FaceId) -> SVec<VertexId> {
        self.face_halfedges(face_id)
            .iter()
            .map(|h| self.at_halfedge(*h).vertex().end())
            .collect()
    }

    pub fn face_normal(&self, face_id: FaceId) -> Option<Vec3> {
        let [a, b, c] = self.face_positions(face_id)?;
        triangle_normal(a, b, c)
    }

    pub fn face_area(&self, face_id: FaceId) -> f32 {
        match self.face_positions(face_id) {
            Some([a, b, c]) => triangle_area(a, b, c),
            None => 0.0,
        }
    }

    pub fn face_quality(&self, face_id: FaceId) -> f32 {
        match self.face_positions(face_id) {
            Some([a, b, c]) => triangle_quality(a, b, c),
            None => 0.0,
        }
    }

    /// The three corner positions of a triangular face, or `None` when the
    /// face loop is not a triangle.
    pub fn face_positions(&self, face_id: FaceId) -> Option<[Vec3; 3]> {
        let vs = self.face_vertices(face_id);
        if vs.len() != 3 {
            return None;
        }
        Some([
            self.vertices.get(vs[0])?.position,
            self.vertices.get(vs[1])?.position,
            self.vertices.get(vs[2])?.position,
        ])
    }

    /// Returns the average of a face's vertex positions.
    pub fn face_vertex_average(&self, face_id: FaceId) -> Vec3 {
        let vs = self.face_vertices(face_id);
        let sum = vs
            .iter()
            .fold(Vec3::ZERO, |acc, &v| acc + self.vertices[v].position);
        sum / vs.len().max(1) as f32
    }

    pub fn edge_endpoints(&self, edge: EdgeId) -> (VertexId, VertexId) {
        self.edges[edge].endpoints
    }

    /// The distinct faces incident to an edge.
    pub fn edge_faces(&self, edge: EdgeId) -> SVec<FaceId> {
        let mut result = SVec::new();
        for &h in self.edges[edge].halfedges.iter() {
            if let Some(f) = self.halfedges[h].face {
                if !result.contains(&f) {
                    result.push(f);
                }
            }
        }
        result
    }

    pub fn edge_face_count(&self, edge: EdgeId) -> usize {
        self.edge_faces(edge).len()
    }

    /// Recomputes the cached length of one edge from vertex positions.
    pub fn update_edge_length(&mut self, edge: EdgeId) {
        let (a, b) = self.edges[edge].endpoints;
        let length = self.vertices[a].position.distance(self.vertices[b].position);
        self.edges[edge].length = length;
    }

    /// Recomputes the cached lengths of all edges incident to `v`. Called
    /// after relocating the vertex.
    pub fn update_vertex_edge_lengths(&mut self, v: VertexId) {
        let edges: SVec<EdgeId> = self.incident_edges(v).iter().copied().collect();
        for e in edges {
            self.update_edge_length(e);
        }
    }

    /// Sets the position for a given vertex
    pub fn set_vertex_position(&mut self, vertex: VertexId, position: Vec3) {
        self.vertex_mut(vertex).unwrap().position = position;
        self.update_vertex_edge_lengths(vertex);
    }

    pub fn vertex_position(&self, vertex: VertexId) -> Vec3 {
        self.vertex(vertex).unwrap().position
    }

    pub fn vertex_exists(&self, vertex: VertexId) -> bool {
        self.vertex(vertex).is_some()
    }

    /* ========= */
    /*  Imports  */
    /* ========= */

    /// Builds the connectivity store from a host-container position buffer
    /// and a triangle index buffer.
    pub fn from_buffers(positions: &[Vec3], indices: &[u32]) -> Result<Self> {
        Self::from_buffers_with_features(positions, indices, &[])
    }

    /// Like [`MeshConnectivity::from_buffers`], additionally marking the
    /// given vertex-index pairs as feature edges where they resolve to
    /// manifold edges.
    pub fn from_buffers_with_features(
        positions: &[Vec3],
        indices: &[u32],
        feature_edges: &[(u32, u32)],
    ) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(MalformedInput::NonTriangular(indices.len()).into());
        }
        for (i, p) in positions.iter().enumerate() {
            if !p.is_finite() {
                return Err(MalformedInput::PositionNotFinite(i).into());
            }
        }
        for &index in indices {
            if index as usize >= positions.len() {
                return Err(MalformedInput::IndexOutOfRange {
                    index,
                    vertex_count: positions.len(),
                }
                .into());
            }
        }

        let mut mesh = Self::new();
        let vertex_ids: Vec<VertexId> = positions.iter().map(|&p| mesh.alloc_vertex(p)).collect();

        for tri in indices.chunks_exact(3) {
            mesh.add_triangle(
                vertex_ids[tri[0] as usize],
                vertex_ids[tri[1] as usize],
                vertex_ids[tri[2] as usize],
            )?;
        }

        for &(i, j) in feature_edges {
            if (i as usize) < vertex_ids.len() && (j as usize) < vertex_ids.len() {
                let _ = mesh.mark_feature_edge(vertex_ids[i as usize], vertex_ids[j as usize]);
            }
        }

        mesh.classify_vertices();
        Ok(mesh)
    }

    /// Marks the edge joining `a` and `b` as a feature edge. Only manifold
    /// (two-face) edges accept the mark; boundary and non-manifold edges are
    /// already skeleton edges and keep their kind. Returns whether the mark
    /// was applied.
    pub fn mark_feature_edge(&mut self, a: VertexId, b: VertexId) -> Result<bool> {
        let e = self
            .edge_between(a, b)
            .ok_or_else(|| anyhow!("no edge between {a:?} and {b:?}"))?;
        if self.edges[e].kind != EdgeKind::Manifold {
            return Ok(false);
        }
        self.edges[e].kind = EdgeKind::Feature;
        self.vertices[a].marked = true;
        self.vertices[b].marked = true;
        self.classify_vertex(a);
        self.classify_vertex(b);
        Ok(true)
    }

    /// Downgrades every feature edge back to manifold and clears the feature
    /// marks. Used when remeshing with `preserve_features` off.
    pub fn clear_feature_marks(&mut self) {
        let feature_edges: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, e)| e.kind == EdgeKind::Feature)
            .map(|(id, _)| id)
            .collect();
        for e in feature_edges {
            self.edges[e].kind = EdgeKind::Manifold;
        }
        for (_, v) in self.vertices.iter_mut() {
            v.marked = false;
        }
        self.classify_vertices();
    }

    /* ======== */
    /*  Access  */
    /* ======== */

    pub(crate) fn set_edge_kind(&mut self, e: EdgeId, kind: EdgeKind) {
        self.edges[e].kind = kind;
    }
}
