//! A reference [`SerialTessellator`]: brute-force half-space clipping.
//!
//! Every cell is, by definition, the intersection of the bisecting
//! half-spaces to every other generator with the domain boundary. This
//! crate's distributed core never needs the tessellator to be *fast* --
//! that is the out-of-scope "serial tessellator" collaborator's job in a
//! real deployment (a Voro++ / Triangle / TetGen style kernel with spatial
//! acceleration, the shape of the teacher crate's own `ConvexCell::build`,
//! which clips each cell against its nearest neighbors found via an
//! `rstar` index). What this crate's own tests need is a tessellator that
//! is *obviously correct*, so this kernel clips against every other
//! generator unconditionally: O(N) half-spaces per cell, fine for the
//! generator counts exercised by this crate's test suite.
//!
//! A face shared between two generators is computed directly as the
//! bisector plane clipped by every *other* generator's bisector with the
//! shared pair plus the domain boundary -- not as two independently
//! clipped cells that are then matched up. This is what guarantees the two
//! cells agree on the exact same face (same node coordinates) without a
//! reconciliation pass, which is the real serial tessellator's job inside
//! a single rank; reconciliation across ranks is what
//! `crate::distributed::reconcile` is for.
//!
//! Limitations (reference-kernel-only, not spec gaps): PLC clipping only
//! uses the outer facet loop (holes are accepted but ignored -- real
//! polygon/polyhedron clipping with holes is exactly the kind of low-level
//! geometry spec.md §1 rules out of scope), a cell's face list is ordered
//! by construction order rather than a geometric winding, and "unbounded"
//! mode closes cells against a large synthetic box rather than a true
//! inf-sphere.

use std::collections::HashMap;

use glam::{DVec2, DVec3};

use crate::error::{DistributedTessellationError, Result};
use crate::geometry::{point_at, point_count, BoundingBox, Dim, Plc};
use crate::mesh::Mesh;
use crate::quantize::{FixedSpacingQuantizer, LatticeKey, LatticeQuantizer};
use crate::tessellator::SerialTessellator;

const OUTER_BOX_SCALE: f64 = 1000.0;
const CLIP_HALF_EXTENT: f64 = 1.0e6;

#[derive(Clone)]
struct HalfSpace {
    normal: DVec3,
    offset: f64,
    is_inf: bool,
}

impl HalfSpace {
    fn bisector(gi: DVec3, gj: DVec3) -> Self {
        let normal = gj - gi;
        let mid = (gi + gj) * 0.5;
        HalfSpace {
            offset: normal.dot(mid),
            normal,
            is_inf: false,
        }
    }

    fn axis(dim: Dim, axis: usize, sign: f64, value: f64) -> Self {
        let mut n = DVec3::ZERO;
        match axis {
            0 => n.x = sign,
            1 => n.y = sign,
            _ if dim == Dim::Three => n.z = sign,
            _ => unreachable!("axis out of range for dimension"),
        }
        HalfSpace {
            normal: n,
            offset: sign * value,
            is_inf: false,
        }
    }
}

pub struct ReferenceSerialTessellator {
    pub degeneracy: f64,
}

impl Default for ReferenceSerialTessellator {
    fn default() -> Self {
        ReferenceSerialTessellator { degeneracy: 1.0e-9 }
    }
}

impl SerialTessellator for ReferenceSerialTessellator {
    fn degeneracy(&self) -> f64 {
        self.degeneracy
    }

    fn tessellate_unbounded(&self, dim: Dim, points: &[f64]) -> Result<Mesh> {
        let gens = load_points(dim, points)?;
        if gens.is_empty() {
            // No generators, so no boundary box is needed either: every
            // loop in `tessellate_core` below is over `gens` and degenerates
            // to nothing, yielding a correctly empty mesh. A zero-generator
            // rank still has to participate in the distributed protocol
            // (spec.md §4.1), it just never reaches the serial tessellator
            // with a nonempty set.
            return tessellate_core(dim, &gens, Vec::new(), self.degeneracy);
        }
        let bbox = BoundingBox::from_flat(dim, points);
        let diag = (bbox.high - bbox.low).length().max(1.0);
        let center = (bbox.low + bbox.high) * 0.5;
        let half = DVec3::splat(diag * OUTER_BOX_SCALE * 0.5);
        let low = center - half;
        let high = center + half;
        let mut boundary = box_halfspaces(dim, low, high);
        for h in boundary.iter_mut() {
            h.is_inf = true;
        }
        tessellate_core(dim, &gens, boundary, self.degeneracy)
    }

    fn tessellate_box(&self, dim: Dim, points: &[f64], low: &[f64], high: &[f64]) -> Result<Mesh> {
        let gens = load_points(dim, points)?;
        if low.len() != dim.size() || high.len() != dim.size() {
            return Err(DistributedTessellationError::invalid_input(
                "low/high length does not match dimension",
            ));
        }
        let low_p = point_at(dim, low, 0);
        let high_p = point_at(dim, high, 0);
        let boundary = box_halfspaces(dim, low_p, high_p);
        tessellate_core(dim, &gens, boundary, self.degeneracy)
    }

    fn tessellate_plc(
        &self,
        dim: Dim,
        points: &[f64],
        plc_points: &[f64],
        plc: &Plc,
    ) -> Result<Mesh> {
        let gens = load_points(dim, points)?;
        let verts: Vec<DVec3> = (0..point_count(dim, plc_points))
            .map(|i| point_at(dim, plc_points, i))
            .collect();
        let mut boundary = Vec::with_capacity(plc.facets.len());
        for facet in &plc.facets {
            boundary.push(plc_facet_halfspace(dim, &verts, facet)?);
        }
        tessellate_core(dim, &gens, boundary, self.degeneracy)
    }
}

fn load_points(dim: Dim, points: &[f64]) -> Result<Vec<DVec3>> {
    if points.len() % dim.size() != 0 {
        return Err(DistributedTessellationError::invalid_input(
            "point array length is not a multiple of the dimension",
        ));
    }
    Ok((0..point_count(dim, points)).map(|i| point_at(dim, points, i)).collect())
}

fn box_halfspaces(dim: Dim, low: DVec3, high: DVec3) -> Vec<HalfSpace> {
    let axes = dim.size();
    let low_arr = [low.x, low.y, low.z];
    let high_arr = [high.x, high.y, high.z];
    let mut hs = Vec::with_capacity(2 * axes);
    for axis in 0..axes {
        hs.push(HalfSpace::axis(dim, axis, -1.0, low_arr[axis]));
        hs.push(HalfSpace::axis(dim, axis, 1.0, high_arr[axis]));
    }
    hs
}

fn plc_facet_halfspace(dim: Dim, verts: &[DVec3], facet: &[u32]) -> Result<HalfSpace> {
    if facet.len() < 2 {
        return Err(DistributedTessellationError::invalid_input(
            "PLC facet needs at least two vertices",
        ));
    }
    let pts: Vec<DVec3> = facet.iter().map(|&i| verts[i as usize]).collect();
    match dim {
        Dim::Two => {
            let a = pts[0];
            let b = pts[1];
            let edge = b - a;
            let normal = DVec3::new(edge.y, -edge.x, 0.0);
            Ok(HalfSpace {
                offset: normal.dot(a),
                normal,
                is_inf: false,
            })
        }
        Dim::Three => {
            let normal = newell_normal(&pts);
            Ok(HalfSpace {
                offset: normal.dot(pts[0]),
                normal,
                is_inf: false,
            })
        }
    }
}

fn newell_normal(verts: &[DVec3]) -> DVec3 {
    let mut n = DVec3::ZERO;
    for i in 0..verts.len() {
        let a = verts[i];
        let b = verts[(i + 1) % verts.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n.normalize()
}

struct NodeRegistry {
    quantizer: FixedSpacingQuantizer,
    origin: DVec3,
    spacing: f64,
    index: HashMap<LatticeKey, u32>,
    coords: Vec<DVec3>,
    is_inf: Vec<bool>,
}

impl NodeRegistry {
    fn new(origin: DVec3, spacing: f64) -> Self {
        NodeRegistry {
            quantizer: FixedSpacingQuantizer,
            origin,
            spacing,
            index: HashMap::new(),
            coords: Vec::new(),
            is_inf: Vec::new(),
        }
    }

    fn get_or_insert(&mut self, p: DVec3, inf: bool) -> u32 {
        let key = self.quantizer.quantize(self.origin, self.spacing, p);
        if let Some(&id) = self.index.get(&key) {
            if inf {
                self.is_inf[id as usize] = true;
            }
            return id;
        }
        let id = self.coords.len() as u32;
        self.index.insert(key, id);
        self.coords.push(p);
        self.is_inf.push(inf);
        id
    }
}

struct FaceRec {
    nodes: Vec<u32>,
    cells: Vec<u32>,
    is_inf: bool,
}

fn tessellate_core(dim: Dim, gens: &[DVec3], boundary: Vec<HalfSpace>, degeneracy: f64) -> Result<Mesh> {
    let n = gens.len();
    // A zero-generator set is a valid input here (spec.md §4.1: "a
    // zero-generator process must still participate"), not a local error --
    // every loop below is over `gens`/`n` and is simply empty, yielding an
    // empty mesh. Rejecting a genuinely invalid, globally-empty point set is
    // the distributed driver's job, not this per-call kernel's.
    // The quantization origin only needs to be identical for every caller
    // tessellating the same generator set; the generators' own bounding
    // box is a convenient, cheaply-recomputed choice.
    let mut extent = BoundingBox::empty();
    for &g in gens {
        extent.expand(g);
    }
    let mut registry = NodeRegistry::new(extent.low, degeneracy);

    let mut faces: Vec<FaceRec> = Vec::new();
    let mut cell_face_refs: Vec<Vec<i64>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            let other_constraints: Vec<HalfSpace> = (0..n)
                .filter(|&m| m != i && m != j)
                .map(|m| HalfSpace::bisector(gens[i], gens[m]))
                .chain(boundary.iter().cloned())
                .collect();
            let bisector = HalfSpace::bisector(gens[i], gens[j]);
            if let Some(nodes) = clip_plane(dim, &bisector, &other_constraints, degeneracy, &mut registry, false) {
                let face_id = faces.len() as u32;
                faces.push(FaceRec {
                    nodes,
                    cells: vec![i as u32, j as u32],
                    is_inf: false,
                });
                cell_face_refs[i].push(crate::mesh::encode_face_ref(face_id, false));
                cell_face_refs[j].push(crate::mesh::encode_face_ref(face_id, true));
            }
        }
    }

    for i in 0..n {
        for (b_idx, b) in boundary.iter().enumerate() {
            let mut constraints: Vec<HalfSpace> = (0..n)
                .filter(|&m| m != i)
                .map(|m| HalfSpace::bisector(gens[i], gens[m]))
                .collect();
            constraints.extend(
                boundary
                    .iter()
                    .enumerate()
                    .filter(|&(k, _)| k != b_idx)
                    .map(|(_, h)| h.clone()),
            );
            if let Some(nodes) = clip_plane(dim, b, &constraints, degeneracy, &mut registry, b.is_inf) {
                let face_id = faces.len() as u32;
                faces.push(FaceRec {
                    nodes,
                    cells: vec![i as u32],
                    is_inf: b.is_inf,
                });
                cell_face_refs[i].push(crate::mesh::encode_face_ref(face_id, false));
            }
        }
    }

    let mut nodes_flat = Vec::new();
    for &p in &registry.coords {
        crate::geometry::push_point(dim, &mut nodes_flat, p);
    }

    Ok(Mesh {
        dim: Some(dim),
        nodes: nodes_flat,
        faces: faces.iter().map(|f| f.nodes.clone()).collect(),
        cells: cell_face_refs,
        face_cells: faces
            .iter()
            .map(|f| f.cells.iter().map(|&c| c as i64).collect())
            .collect(),
        inf_nodes: registry.is_inf,
        inf_faces: faces.iter().map(|f| f.is_inf).collect(),
        neighbor_domains: Vec::new(),
        shared_nodes: Vec::new(),
        shared_faces: Vec::new(),
    })
}

/// Clip the given plane/line (`target`) by `constraints`, returning the
/// node list of the surviving face, or `None` if the intersection is empty
/// or degenerate. Dispatches on dimension: in 2D the "plane" is a line and
/// the face is a 2-node segment; in 3D it is a proper plane and the face is
/// a polygon clipped in the plane's own local 2D coordinates.
fn clip_plane(
    dim: Dim,
    target: &HalfSpace,
    constraints: &[HalfSpace],
    tol: f64,
    registry: &mut NodeRegistry,
    inf: bool,
) -> Option<Vec<u32>> {
    match dim {
        Dim::Two => {
            let origin = target.normal * (target.offset / target.normal.length_squared());
            let dir = DVec3::new(-target.normal.y, target.normal.x, 0.0).normalize();
            let (t0, t1) = clip_line_1d(origin, dir, constraints, tol)?;
            if t1 - t0 <= tol {
                return None;
            }
            let p0 = origin + dir * t0;
            let p1 = origin + dir * t1;
            Some(vec![
                registry.get_or_insert(p0, inf),
                registry.get_or_insert(p1, inf),
            ])
        }
        Dim::Three => {
            let origin = target.normal * (target.offset / target.normal.length_squared());
            let (u, v) = plane_basis(target.normal);
            let mut poly = initial_square(CLIP_HALF_EXTENT);
            for c in constraints {
                let local_normal = DVec2::new(c.normal.dot(u), c.normal.dot(v));
                let local_offset = c.offset - c.normal.dot(origin);
                poly = clip_by_constraint_2d(poly, local_normal, local_offset, tol);
                if poly.is_empty() {
                    return None;
                }
            }
            if polygon_area(&poly) <= tol * tol {
                return None;
            }
            Some(
                poly.iter()
                    .map(|p2| registry.get_or_insert(origin + u * p2.x + v * p2.y, inf))
                    .collect(),
            )
        }
    }
}

/// Feasible interval of `t` such that `origin + t*dir` satisfies every
/// constraint, or `None` if infeasible.
fn clip_line_1d(origin: DVec3, dir: DVec3, constraints: &[HalfSpace], tol: f64) -> Option<(f64, f64)> {
    let mut tmin = f64::NEG_INFINITY;
    let mut tmax = f64::INFINITY;
    for c in constraints {
        let a = c.normal.dot(dir);
        let b = c.offset - c.normal.dot(origin);
        if a.abs() < tol {
            if b < -tol {
                return None;
            }
        } else if a > 0.0 {
            tmax = tmax.min(b / a);
        } else {
            tmin = tmin.max(b / a);
        }
    }
    if tmin > tmax + tol {
        None
    } else {
        Some((tmin, tmax))
    }
}

fn plane_basis(normal: DVec3) -> (DVec3, DVec3) {
    let n = normal.normalize();
    let helper = if n.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
    let u = helper.cross(n).normalize();
    let v = n.cross(u);
    (u, v)
}

fn initial_square(half_extent: f64) -> Vec<DVec2> {
    vec![
        DVec2::new(-half_extent, -half_extent),
        DVec2::new(half_extent, -half_extent),
        DVec2::new(half_extent, half_extent),
        DVec2::new(-half_extent, half_extent),
    ]
}

fn clip_by_constraint_2d(poly: Vec<DVec2>, normal: DVec2, offset: f64, tol: f64) -> Vec<DVec2> {
    if normal.length() < tol {
        return if offset < -tol { Vec::new() } else { poly };
    }
    clip_by_halfplane(&poly, normal, offset, tol)
}

fn clip_by_halfplane(poly: &[DVec2], normal: DVec2, offset: f64, tol: f64) -> Vec<DVec2> {
    if poly.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(poly.len() + 1);
    for i in 0..poly.len() {
        let cur = poly[i];
        let prev = poly[(i + poly.len() - 1) % poly.len()];
        let cur_in = normal.dot(cur) <= offset + tol;
        let prev_in = normal.dot(prev) <= offset + tol;
        if cur_in {
            if !prev_in {
                out.push(intersect_edge(prev, cur, normal, offset));
            }
            out.push(cur);
        } else if prev_in {
            out.push(intersect_edge(prev, cur, normal, offset));
        }
    }
    out
}

fn intersect_edge(a: DVec2, b: DVec2, normal: DVec2, offset: f64) -> DVec2 {
    let da = normal.dot(a) - offset;
    let db = normal.dot(b) - offset;
    let t = da / (da - db);
    a + (b - a) * t
}

fn polygon_area(poly: &[DVec2]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        area += a.x * b.y - b.x * a.y;
    }
    (area * 0.5).abs()
}
