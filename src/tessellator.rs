//! The serial Voronoi/Delaunay primitive, consumed as a black box
//! (spec.md §2 step 1, §6). This crate never implements Voronoi geometry
//! itself beyond what [`crate::reference`] needs to exercise the
//! distributed protocol end to end.

use crate::error::Result;
use crate::geometry::{Dim, Mode, Plc};
use crate::mesh::Mesh;

/// A reentrant, stateless-from-the-caller's-perspective serial tessellator.
/// Implementations must be safe to invoke repeatedly from a single rank
/// (spec.md §5: "no concurrent invocations are required", but repeat calls
/// from the same thread must not corrupt shared state).
pub trait SerialTessellator {
    /// The minimum coordinate separation this kernel can resolve; used as
    /// the lattice spacing for deterministic shared-element ordering
    /// (spec.md §4.4) and as the area/volume law's tolerance scale.
    fn degeneracy(&self) -> f64;

    fn tessellate(&self, dim: Dim, points: &[f64], mode: Mode<'_>) -> Result<Mesh> {
        match mode {
            Mode::Unbounded => self.tessellate_unbounded(dim, points),
            Mode::Box { low, high } => self.tessellate_box(dim, points, low, high),
            Mode::Plc { plc_points, plc } => self.tessellate_plc(dim, points, plc_points, plc),
        }
    }

    fn tessellate_unbounded(&self, dim: Dim, points: &[f64]) -> Result<Mesh>;

    fn tessellate_box(&self, dim: Dim, points: &[f64], low: &[f64], high: &[f64]) -> Result<Mesh>;

    fn tessellate_plc(
        &self,
        dim: Dim,
        points: &[f64],
        plc_points: &[f64],
        plc: &Plc,
    ) -> Result<Mesh>;
}
