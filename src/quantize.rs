//! Normalization / quantization module (spec.md §2 step 3, §4.4). Maps
//! real-valued coordinates onto a fixed-origin integer lattice whose spacing
//! is the serial kernel's degeneracy, giving every rank the same ordering
//! key for a shared node or face without any communication.

use glam::DVec3;

use crate::geometry::BoundingBox;

/// An integer lattice key, lexicographically ordered. Two points within
/// `spacing` of each other that both rank's floating point math places on
/// the same side of a lattice boundary will compare equal here, and
/// consistent ties are broken by the caller's stable tag (the node or face
/// index) -- see `crate::distributed::shared_elements`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LatticeKey(pub i64, pub i64, pub i64);

pub trait LatticeQuantizer {
    fn quantize(&self, origin: DVec3, spacing: f64, p: DVec3) -> LatticeKey;
}

#[derive(Default)]
pub struct FixedSpacingQuantizer;

impl LatticeQuantizer for FixedSpacingQuantizer {
    fn quantize(&self, origin: DVec3, spacing: f64, p: DVec3) -> LatticeKey {
        debug_assert!(spacing > 0.0, "lattice spacing (degeneracy) must be positive");
        let v = (p - origin) / spacing;
        LatticeKey(v.x.floor() as i64, v.y.floor() as i64, v.z.floor() as i64)
    }
}

/// Convenience: quantize a point tagged with its original index, the shape
/// `shared_elements` sorts by key and writes the tag back out in order.
#[derive(Clone, Copy, Debug)]
pub struct TaggedKey {
    pub key: LatticeKey,
    pub tag: u32,
}

impl PartialEq for TaggedKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for TaggedKey {}
impl PartialOrd for TaggedKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TaggedKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key).then(self.tag.cmp(&other.tag))
    }
}

pub fn quantize_with_bbox(
    quantizer: &dyn LatticeQuantizer,
    bbox: &BoundingBox,
    spacing: f64,
    p: DVec3,
    tag: u32,
) -> TaggedKey {
    TaggedKey {
        key: quantizer.quantize(bbox.low, spacing, p),
        tag,
    }
}
