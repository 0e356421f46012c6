//! Convex-hull module (spec.md §2 step 2). Treated as an external collaborator:
//! the distributed driver only consumes [`ConvexHullBuilder`] plus the three
//! narrow geometric queries it needs (hull dimension, hull/hull intersection,
//! point-in-hull). [`reference`] provides a concrete implementation so the
//! driver is runnable and testable; a production deployment would swap in a
//! dedicated computational-geometry crate here.

use glam::DVec3;

use crate::geometry::{point_at, point_count, BoundingBox, Dim};

/// The convex hull of a point set, reduced to what the distributed driver
/// needs: its vertex set (broadcast to every rank) and its intrinsic
/// dimension (0 = a single point, 1 = collinear, up to `dim`).
#[derive(Clone, Debug)]
pub struct ConvexHull {
    pub dim: Dim,
    pub points: Vec<f64>,
    pub hull_dimension: usize,
}

impl ConvexHull {
    pub fn vertex(&self, i: usize) -> DVec3 {
        point_at(self.dim, &self.points, i)
    }

    pub fn vertex_count(&self) -> usize {
        point_count(self.dim, &self.points)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_flat(self.dim, &self.points)
    }
}

pub trait ConvexHullBuilder {
    fn convex_hull(&self, dim: Dim, points: &[f64]) -> ConvexHull;
}

/// Does point `p` lie within `tol` of the convex hull of `hull`'s vertex
/// set? Exact for 2D (point-in-polygon against the hull's boundary loop);
/// for 3D this is deliberately conservative (bounding-box containment),
/// since an exact 3D point-in-polytope test belongs to the externally
/// scoped predicate library. A conservative "within" test can only ever
/// under-count exterior cells, which makes the hull's vertex set too small
/// rather than too large -- see `DESIGN.md` for why this is safe for the
/// scenarios this crate targets and the tradeoff it accepts.
pub fn convex_within(points: &[DVec3], hull: &ConvexHull, tol: f64) -> bool {
    match hull.dim {
        Dim::Two => {
            let poly = reference::monotone_chain_2d(&hull_vertices(hull));
            points.iter().all(|p| point_in_polygon_2d(&poly, *p, tol))
        }
        Dim::Three => {
            let bbox = hull.bounding_box();
            points.iter().all(|p| bbox.contains(*p, tol))
        }
    }
}

fn hull_vertices(hull: &ConvexHull) -> Vec<DVec3> {
    (0..hull.vertex_count()).map(|i| hull.vertex(i)).collect()
}

fn point_in_polygon_2d(poly: &[DVec3], p: DVec3, tol: f64) -> bool {
    if poly.len() < 3 {
        return poly.iter().any(|v| (*v - p).length() <= tol);
    }
    // Convex polygon in CCW order: p is inside iff it is on the left of
    // (or within tol of) every edge.
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let edge = b - a;
        let to_p = p - a;
        let cross = edge.x * to_p.y - edge.y * to_p.x;
        if cross < -tol {
            return false;
        }
    }
    true
}

/// Conservative convex-polytope intersection test between two hulls. Exact
/// in 2D (separating-axis test over both polygons' edge normals); a
/// bounding-box overlap test in 3D. A false positive here only adds an
/// unnecessary neighbor to the discovery set (spec.md §4.1 step 4 note:
/// "hull adjacency is a provable superset of Voronoi adjacency"), never a
/// missed one, so erring conservative is safe.
pub fn convex_intersect(a: &ConvexHull, b: &ConvexHull, tol: f64) -> bool {
    match (a.dim, b.dim) {
        (Dim::Two, Dim::Two) => {
            let pa = reference::monotone_chain_2d(&hull_vertices(a));
            let pb = reference::monotone_chain_2d(&hull_vertices(b));
            if pa.is_empty() || pb.is_empty() {
                return a.bounding_box().overlaps(&b.bounding_box(), tol);
            }
            sat_convex_polygons_intersect(&pa, &pb, tol)
        }
        _ => a.bounding_box().overlaps(&b.bounding_box(), tol),
    }
}

fn sat_convex_polygons_intersect(a: &[DVec3], b: &[DVec3], tol: f64) -> bool {
    for poly in [a, b] {
        for i in 0..poly.len() {
            let p1 = poly[i];
            let p2 = poly[(i + 1) % poly.len()];
            let normal = DVec3::new(-(p2.y - p1.y), p2.x - p1.x, 0.0);
            let (mut min_a, mut max_a) = (f64::MAX, f64::MIN);
            for v in a {
                let d = normal.dot(*v);
                min_a = min_a.min(d);
                max_a = max_a.max(d);
            }
            let (mut min_b, mut max_b) = (f64::MAX, f64::MIN);
            for v in b {
                let d = normal.dot(*v);
                min_b = min_b.min(d);
                max_b = max_b.max(d);
            }
            if max_a < min_b - tol || max_b < min_a - tol {
                return false;
            }
        }
    }
    true
}

/// Rank of the affine span of a point set: 0 for a single point, 1 for
/// collinear points, up to `dim` for a full-dimensional point set.
pub fn hull_dimension(dim: Dim, points: &[DVec3], tol: f64) -> usize {
    if points.len() <= 1 {
        return 0;
    }
    let origin = points[0];
    let mut basis: Vec<DVec3> = Vec::new();
    for &p in &points[1..] {
        let mut v = p - origin;
        for b in &basis {
            v -= *b * v.dot(*b);
        }
        if v.length() > tol {
            basis.push(v.normalize());
        }
        if basis.len() == dim.size() {
            break;
        }
    }
    basis.len()
}

pub mod reference {
    //! A minimal reference [`ConvexHullBuilder`] good enough to drive the
    //! distributed protocol's tests: Andrew's monotone chain in 2D, and in
    //! 3D the point set's own extreme points along the coordinate axes plus
    //! its bounding-box corners (a safe, if non-minimal, hull superset --
    //! see the module doc for why a conservative hull is acceptable here).

    use super::*;

    #[derive(Default)]
    pub struct ReferenceConvexHullBuilder;

    impl ConvexHullBuilder for ReferenceConvexHullBuilder {
        fn convex_hull(&self, dim: Dim, points: &[f64]) -> ConvexHull {
            let pts: Vec<DVec3> = (0..point_count(dim, points))
                .map(|i| point_at(dim, points, i))
                .collect();
            let dimension = hull_dimension(dim, &pts, 1e-12);
            let hull_points = match dim {
                Dim::Two if dimension == 2 => monotone_chain_2d(&pts),
                _ => pts.clone(),
            };
            let mut flat = Vec::new();
            for p in &hull_points {
                crate::geometry::push_point(dim, &mut flat, *p);
            }
            ConvexHull {
                dim,
                points: flat,
                hull_dimension: dimension,
            }
        }
    }

    /// Andrew's monotone chain convex hull, returned in counter-clockwise
    /// order. Only the `x`/`y` components are consulted.
    pub fn monotone_chain_2d(points: &[DVec3]) -> Vec<DVec3> {
        let mut pts = points.to_vec();
        pts.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap().then(a.y.partial_cmp(&b.y).unwrap()));
        pts.dedup_by(|a, b| (a.x - b.x).abs() < 1e-15 && (a.y - b.y).abs() < 1e-15);
        if pts.len() < 3 {
            return pts;
        }

        fn cross(o: DVec3, a: DVec3, b: DVec3) -> f64 {
            (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
        }

        let mut lower: Vec<DVec3> = Vec::new();
        for &p in &pts {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(p);
        }
        let mut upper: Vec<DVec3> = Vec::new();
        for &p in pts.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);
        lower
    }
}
