// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use glam::Vec3;

/// Absolute epsilon used for area and cross-product length comparisons.
/// Decisions that hinge on a sign must reject configurations that land
/// within this band instead of committing.
pub const AREA_EPSILON: f32 = 1e-10;

pub fn triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b - a).cross(c - a).length() * 0.5
}

/// Unit normal of the triangle, or `None` when the triangle is degenerate.
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Option<Vec3> {
    let cross = (b - a).cross(c - a);
    if cross.length_squared() <= AREA_EPSILON * AREA_EPSILON {
        None
    } else {
        Some(cross.normalize())
    }
}

/// Circumradius `abc / 4A`. Returns `f32::INFINITY` for degenerate triangles.
pub fn circumradius(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let area = triangle_area(a, b, c);
    if area <= AREA_EPSILON {
        return f32::INFINITY;
    }
    let la = (b - c).length();
    let lb = (c - a).length();
    let lc = (a - b).length();
    (la * lb * lc) / (4.0 * area)
}

/// Inradius `A / s` where `s` is the semi-perimeter.
pub fn inradius(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let s = ((b - c).length() + (c - a).length() + (a - b).length()) * 0.5;
    if s <= 0.0 {
        return 0.0;
    }
    triangle_area(a, b, c) / s
}

/// Triangle quality `2·r_in / r_circ`, clamped to [0, 1]. An equilateral
/// triangle scores 1, a degenerate one 0.
pub fn triangle_quality(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let area = triangle_area(a, b, c);
    if area <= AREA_EPSILON {
        return 0.0;
    }
    let la = (b - c).length();
    let lb = (c - a).length();
    let lc = (a - b).length();
    let s = (la + lb + lc) * 0.5;
    // 2 * (A/s) / (abc / 4A) = 8A^2 / (s*abc)
    let q = (8.0 * area * area) / (s * la * lb * lc);
    q.clamp(0.0, 1.0)
}

/// Interior angle at `apex`, between the directions towards `p` and `q`.
pub fn corner_angle(apex: Vec3, p: Vec3, q: Vec3) -> f32 {
    let u = p - apex;
    let v = q - apex;
    let denom = u.length() * v.length();
    if denom <= AREA_EPSILON {
        return 0.0;
    }
    (u.dot(v) / denom).clamp(-1.0, 1.0).acos()
}

/// Cotangent of the angle at `apex` between the directions towards `p` and
/// `q`. Unbounded for near-degenerate corners; callers clamp.
pub fn cotangent(apex: Vec3, p: Vec3, q: Vec3) -> f32 {
    let u = p - apex;
    let v = q - apex;
    let cross_len = u.cross(v).length();
    if cross_len <= AREA_EPSILON {
        return 0.0;
    }
    u.dot(v) / cross_len
}

/// Barycentric point-in-triangle test. The point is assumed to lie on (or
/// very close to) the triangle's plane.
pub fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= AREA_EPSILON {
        return false;
    }
    let u = (d11 * d20 - d01 * d21) / denom;
    let v = (d00 * d21 - d01 * d20) / denom;

    u >= 0.0 && v >= 0.0 && (u + v) <= 1.0
}

/// Closest point to `p` on the triangle `(a, b, c)`, handling all Voronoi
/// regions (vertices, edges, interior).
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let t = d1 / (d1 - d3);
        return a + ab * t;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let t = d2 / (d2 - d6);
        return a + ac * t;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * t;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Closest point to `p` on the segment `(a, b)`, together with the clamped
/// parameter along the segment.
pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> (Vec3, f32) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= AREA_EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Convexity test for the quadrilateral `quad` given in cyclic order,
/// evaluated against the reference normal `n`. All four corner turns must
/// agree with `n`; a turn whose magnitude falls within the epsilon band makes
/// the decision ambiguous and the quad is rejected.
pub fn is_convex_quad(quad: [Vec3; 4], n: Vec3) -> bool {
    for i in 0..4 {
        let prev = quad[(i + 3) % 4];
        let cur = quad[i];
        let next = quad[(i + 1) % 4];
        let turn = (cur - prev).cross(next - cur).dot(n);
        if turn <= AREA_EPSILON {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equilateral_quality_is_one() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(0.5, 3.0f32.sqrt() / 2.0, 0.0);
        let q = triangle_quality(a, b, c);
        assert!((q - 1.0).abs() < 1e-4, "quality was {q}");
    }

    #[test]
    fn degenerate_quality_is_zero() {
        let a = Vec3::ZERO;
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(triangle_quality(a, b, c), 0.0);
        assert!(triangle_normal(a, b, c).is_none());
    }

    #[test]
    fn point_in_triangle_classifies_centroid_and_outside() {
        let a = Vec3::ZERO;
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 1.0, 0.0);
        assert!(point_in_triangle(Vec3::new(0.25, 0.25, 0.0), a, b, c));
        assert!(!point_in_triangle(Vec3::new(1.0, 1.0, 0.0), a, b, c));
    }

    #[test]
    fn closest_point_regions() {
        let a = Vec3::ZERO;
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 1.0, 0.0);

        // Above the interior projects straight down
        let p = closest_point_on_triangle(Vec3::new(0.2, 0.2, 1.0), a, b, c);
        assert!(p.abs_diff_eq(Vec3::new(0.2, 0.2, 0.0), 1e-6));

        // Beyond a vertex clamps to the vertex
        let p = closest_point_on_triangle(Vec3::new(-1.0, -1.0, 0.0), a, b, c);
        assert!(p.abs_diff_eq(a, 1e-6));

        // Beside an edge clamps onto the edge
        let p = closest_point_on_triangle(Vec3::new(0.5, -1.0, 0.0), a, b, c);
        assert!(p.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn convex_quad_test() {
        let n = Vec3::Z;
        let convex = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        assert!(is_convex_quad(convex, n));

        // Reflex corner at the dent
        let non_convex = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.1, 0.1, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        assert!(!is_convex_quad(non_convex, n));
    }

    #[test]
    fn circum_and_inradius_of_right_triangle() {
        let a = Vec3::ZERO;
        let b = Vec3::new(3.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 4.0, 0.0);
        // 3-4-5 right triangle: R = hyp/2, r = (a + b - hyp)/2
        assert!((circumradius(a, b, c) - 2.5).abs() < 1e-5);
        assert!((inradius(a, b, c) - 1.0).abs() < 1e-5);
    }
}
