// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use float_ord::FloatOrd;
use glam::Vec3;

use tessera_commons::geometry::closest_point_on_triangle;

/// One input triangle. The payload is its index in the build array.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }
}

/// The nearest surface point found by [`Bvh::closest_point`].
#[derive(Debug, Clone, Copy)]
pub struct ClosestPoint {
    pub point: Vec3,
    /// Index of the triangle in the build array.
    pub triangle: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    fn add_triangle(&mut self, t: &Triangle) {
        self.min = self.min.min(t.a).min(t.b).min(t.c);
        self.max = self.max.max(t.a).max(t.b).max(t.c);
    }

    /// Index of the axis with the largest extent.
    fn longest_axis(&self) -> usize {
        let extent = self.max - self.min;
        if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        }
    }

    fn distance_squared(&self, p: Vec3) -> f32 {
        let clamped = p.clamp(self.min, self.max);
        clamped.distance_squared(p)
    }
}

#[derive(Debug, Clone)]
enum BvhNode {
    Internal {
        aabb: Aabb,
        left: usize,
        right: usize,
    },
    Leaf {
        aabb: Aabb,
        /// Range into the reordered triangle index list.
        start: usize,
        count: usize,
    },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Internal { aabb, .. } | BvhNode::Leaf { aabb, .. } => aabb,
        }
    }
}

/// A static median-split BVH over a triangle array. Built once; any change
/// to the underlying geometry requires a rebuild. The split axis is the
/// longest extent of the node's box and the split position the median
/// centroid along it.
#[derive(Debug, Clone)]
pub struct Bvh {
    triangles: Vec<Triangle>,
    /// Triangle indices, permuted so every node owns a contiguous range.
    order: Vec<u32>,
    nodes: Vec<BvhNode>,
    root: usize,
}

pub const DEFAULT_LEAF_SIZE: usize = 4;

impl Bvh {
    pub fn build(triangles: Vec<Triangle>) -> Self {
        Self::build_with_leaf_size(triangles, DEFAULT_LEAF_SIZE)
    }

    #[profiling::function]
    pub fn build_with_leaf_size(triangles: Vec<Triangle>, leaf_size: usize) -> Self {
        let leaf_size = leaf_size.max(1);
        let mut order: Vec<u32> = (0..triangles.len() as u32).collect();
        let mut nodes = Vec::new();
        let root = if triangles.is_empty() {
            0
        } else {
            let len = order.len();
            build_node(&triangles, &mut order, &mut nodes, 0, len, leaf_size)
        };
        Self {
            triangles,
            order,
            nodes,
            root,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// The nearest point on any triangle, with its triangle index. `None`
    /// when the hierarchy is empty.
    #[profiling::function]
    pub fn closest_point(&self, p: Vec3) -> Option<ClosestPoint> {
        if self.is_empty() {
            return None;
        }

        let mut best: Option<ClosestPoint> = None;
        let mut best_dist_sq = f32::MAX;
        let mut stack = vec![self.root];

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if node.aabb().distance_squared(p) > best_dist_sq {
                continue;
            }
            match node {
                BvhNode::Leaf { start, count, .. } => {
                    for &tri_idx in &self.order[*start..*start + *count] {
                        let t = &self.triangles[tri_idx as usize];
                        let candidate = closest_point_on_triangle(p, t.a, t.b, t.c);
                        let dist_sq = candidate.distance_squared(p);
                        if dist_sq < best_dist_sq {
                            best_dist_sq = dist_sq;
                            best = Some(ClosestPoint {
                                point: candidate,
                                triangle: tri_idx as usize,
                                distance: dist_sq.sqrt(),
                            });
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    // Visit the nearer child first so the bound tightens early
                    let dl = self.nodes[*left].aabb().distance_squared(p);
                    let dr = self.nodes[*right].aabb().distance_squared(p);
                    if dl <= dr {
                        stack.push(*right);
                        stack.push(*left);
                    } else {
                        stack.push(*left);
                        stack.push(*right);
                    }
                }
            }
        }
        best
    }

    /// Indices of all triangles whose closest surface point lies within
    /// `radius` of `p`.
    pub fn query_radius(&self, p: Vec3, radius: f32) -> Vec<usize> {
        let mut result = Vec::new();
        if self.is_empty() || !(radius >= 0.0) {
            return result;
        }
        let radius_sq = radius * radius;
        let mut stack = vec![self.root];

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if node.aabb().distance_squared(p) > radius_sq {
                continue;
            }
            match node {
                BvhNode::Leaf { start, count, .. } => {
                    for &tri_idx in &self.order[*start..*start + *count] {
                        let t = &self.triangles[tri_idx as usize];
                        let candidate = closest_point_on_triangle(p, t.a, t.b, t.c);
                        if candidate.distance_squared(p) <= radius_sq {
                            result.push(tri_idx as usize);
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(*left);
                    stack.push(*right);
                }
            }
        }
        result
    }
}

fn build_node(
    triangles: &[Triangle],
    order: &mut [u32],
    nodes: &mut Vec<BvhNode>,
    start: usize,
    count: usize,
    leaf_size: usize,
) -> usize {
    let mut aabb = Aabb::empty();
    for &tri_idx in &order[start..start + count] {
        aabb.add_triangle(&triangles[tri_idx as usize]);
    }

    if count <= leaf_size {
        nodes.push(BvhNode::Leaf { aabb, start, count });
        return nodes.len() - 1;
    }

    let axis = aabb.longest_axis();
    let range = &mut order[start..start + count];
    range.sort_unstable_by_key(|&tri_idx| {
        FloatOrd(triangles[tri_idx as usize].centroid()[axis])
    });

    let half = count / 2;
    let left = build_node(triangles, order, nodes, start, half, leaf_size);
    let right = build_node(triangles, order, nodes, start + half, count - half, leaf_size);
    nodes.push(BvhNode::Internal { aabb, left, right });
    nodes.len() - 1
}

#[cfg(test)]
mod test {
    use super::*;

    fn unit_square() -> Vec<Triangle> {
        vec![
            Triangle {
                a: Vec3::new(0.0, 0.0, 0.0),
                b: Vec3::new(1.0, 0.0, 0.0),
                c: Vec3::new(1.0, 1.0, 0.0),
            },
            Triangle {
                a: Vec3::new(0.0, 0.0, 0.0),
                b: Vec3::new(1.0, 1.0, 0.0),
                c: Vec3::new(0.0, 1.0, 0.0),
            },
        ]
    }

    #[test]
    fn empty_bvh_has_no_closest_point() {
        let bvh = Bvh::build(Vec::new());
        assert!(bvh.closest_point(Vec3::ZERO).is_none());
        assert!(bvh.query_radius(Vec3::ZERO, 10.0).is_empty());
    }

    #[test]
    fn closest_point_projects_onto_the_square() {
        let bvh = Bvh::build(unit_square());

        let hit = bvh.closest_point(Vec3::new(0.25, 0.25, 2.0)).unwrap();
        assert!(hit.point.abs_diff_eq(Vec3::new(0.25, 0.25, 0.0), 1e-5));
        assert!((hit.distance - 2.0).abs() < 1e-5);

        // Far off a corner, the corner is the nearest point
        let hit = bvh.closest_point(Vec3::new(-3.0, -4.0, 0.0)).unwrap();
        assert!(hit.point.abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!((hit.distance - 5.0).abs() < 1e-4);
    }

    #[test]
    fn radius_query_returns_triangles_in_range() {
        let bvh = Bvh::build(unit_square());

        let hits = bvh.query_radius(Vec3::new(0.5, 0.5, 0.5), 0.6);
        assert_eq!(hits.len(), 2);

        let hits = bvh.query_radius(Vec3::new(0.5, 0.5, 5.0), 1.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn many_triangles_split_into_a_deep_tree() {
        // A row of small triangles along x
        let triangles: Vec<Triangle> = (0..64)
            .map(|i| {
                let x = i as f32;
                Triangle {
                    a: Vec3::new(x, 0.0, 0.0),
                    b: Vec3::new(x + 0.5, 0.0, 0.0),
                    c: Vec3::new(x, 0.5, 0.0),
                }
            })
            .collect();
        let bvh = Bvh::build_with_leaf_size(triangles, 2);

        let hit = bvh.closest_point(Vec3::new(17.1, 0.1, 1.0)).unwrap();
        assert_eq!(hit.triangle, 17);
        assert!((hit.distance - 1.0).abs() < 1e-5);

        let hits = bvh.query_radius(Vec3::new(10.0, 0.0, 0.0), 1.1);
        // Triangles 9, 10 and 11 all touch that ball
        assert!(hits.contains(&9) && hits.contains(&10));
    }
}
