//! Dimension tag, flat-array <-> `glam` conversions, bounding boxes and PLCs.
//!
//! The wire format and public API operate on flat, `D`-strided `f64` slices
//! (mirroring the serial-tessellator interface this crate treats as an
//! external black box); internally we lift points into [`glam::DVec3`] for
//! geometric arithmetic the same way the teacher crate does, zeroing out the
//! unused components for lower dimensionality.

use glam::DVec3;

/// The dimensionality of a tessellation. Only 2D and 3D are in scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dim {
    Two,
    Three,
}

impl Dim {
    pub fn size(self) -> usize {
        match self {
            Dim::Two => 2,
            Dim::Three => 3,
        }
    }

    pub fn from_usize(d: usize) -> Self {
        match d {
            2 => Dim::Two,
            3 => Dim::Three,
            _ => panic!("Invalid tessellation dimensionality: {d} (only 2 and 3 are supported)"),
        }
    }
}

/// Read the `i`-th point out of a flat `dim`-strided array as a [`DVec3`],
/// zero-filling unused components.
pub fn point_at(dim: Dim, flat: &[f64], i: usize) -> DVec3 {
    let d = dim.size();
    match dim {
        Dim::Two => DVec3::new(flat[d * i], flat[d * i + 1], 0.0),
        Dim::Three => DVec3::new(flat[d * i], flat[d * i + 1], flat[d * i + 2]),
    }
}

/// Number of points encoded in a flat `dim`-strided array.
pub fn point_count(dim: Dim, flat: &[f64]) -> usize {
    flat.len() / dim.size()
}

/// Append a [`DVec3`] to a flat `dim`-strided array, dropping unused components.
pub fn push_point(dim: Dim, flat: &mut Vec<f64>, p: DVec3) {
    flat.push(p.x);
    flat.push(p.y);
    if dim == Dim::Three {
        flat.push(p.z);
    }
}

/// An axis-aligned bounding box, tracked per-component so it generalizes to
/// both 2D and 3D without a branch at every use site.
#[derive(Clone, Copy, Debug)]
pub struct BoundingBox {
    pub low: DVec3,
    pub high: DVec3,
}

impl BoundingBox {
    pub fn empty() -> Self {
        BoundingBox {
            low: DVec3::splat(f64::MAX),
            high: DVec3::splat(f64::MIN),
        }
    }

    pub fn expand(&mut self, p: DVec3) {
        self.low = self.low.min(p);
        self.high = self.high.max(p);
    }

    pub fn from_flat(dim: Dim, points: &[f64]) -> Self {
        let mut bbox = BoundingBox::empty();
        for i in 0..point_count(dim, points) {
            bbox.expand(point_at(dim, points, i));
        }
        bbox
    }

    pub fn contains(&self, p: DVec3, tol: f64) -> bool {
        p.x >= self.low.x - tol
            && p.x <= self.high.x + tol
            && p.y >= self.low.y - tol
            && p.y <= self.high.y + tol
            && p.z >= self.low.z - tol
            && p.z <= self.high.z + tol
    }

    pub fn overlaps(&self, other: &BoundingBox, tol: f64) -> bool {
        self.low.x <= other.high.x + tol
            && other.low.x <= self.high.x + tol
            && self.low.y <= other.high.y + tol
            && other.low.y <= self.high.y + tol
            && self.low.z <= other.high.z + tol
            && other.low.z <= self.high.z + tol
    }
}

/// A piecewise-linear complex: an outer boundary plus optional holes, each
/// facet an ordered index sequence into a companion point array. Segments in
/// 2D, planar polygons in 3D.
#[derive(Clone, Debug, Default)]
pub struct Plc {
    pub facets: Vec<Vec<u32>>,
    pub holes: Vec<Vec<Vec<u32>>>,
}

impl Plc {
    pub fn outer_only(facets: Vec<Vec<u32>>) -> Self {
        Plc {
            facets,
            holes: Vec::new(),
        }
    }
}

/// Selects which of the three tessellation modes to run, carrying exactly
/// the data each variant needs (spec's "pointer-typed mode selection" design
/// note: a tagged sum, not a nullable-pointer bag checked at each use site).
#[derive(Clone, Copy)]
pub enum Mode<'a> {
    Unbounded,
    Box { low: &'a [f64], high: &'a [f64] },
    Plc {
        plc_points: &'a [f64],
        plc: &'a Plc,
    },
}
