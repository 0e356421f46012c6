//! Local over-tessellation and trim (spec.md §4.2).

use crate::comm::Communicator;
use crate::error::Result;
use crate::geometry::{point_at, point_count, BoundingBox, Dim, Mode};
use crate::mesh::Mesh;
use crate::tessellator::SerialTessellator;

use super::ghost_exchange::GhostExchangeResult;

/// spec.md §4.2 step 1: compute the bounding box for normalization, then
/// globally reduce it (min across ranks on low, max on high) so every
/// process shares one coordinate frame for the lattice keys used in §4.4.
pub fn global_bounding_box<C: Communicator>(
    comm: &C,
    dim: Dim,
    points: &[f64],
    mode: Mode<'_>,
) -> Result<BoundingBox> {
    let local = match mode {
        Mode::Unbounded => BoundingBox::from_flat(dim, points),
        Mode::Box { low, high } => BoundingBox {
            low: point_at(dim, low, 0),
            high: point_at(dim, high, 0),
        },
        Mode::Plc { plc_points, .. } => BoundingBox::from_flat(dim, plc_points),
    };

    let low_x = comm.all_reduce_min_f64(local.low.x)?;
    let low_y = comm.all_reduce_min_f64(local.low.y)?;
    let low_z = comm.all_reduce_min_f64(local.low.z)?;
    let high_x = comm.all_reduce_max_f64(local.high.x)?;
    let high_y = comm.all_reduce_max_f64(local.high.y)?;
    let high_z = comm.all_reduce_max_f64(local.high.z)?;

    Ok(BoundingBox {
        low: glam::DVec3::new(low_x, low_y, low_z),
        high: glam::DVec3::new(high_x, high_y, high_z),
    })
}

/// spec.md §4.2 step 2: tessellate `generators_extended`. Returns the full,
/// untrimmed mesh -- cell `i` corresponds to generator `i` of
/// `generators_extended`, including the trailing ghost generators. Trim
/// (step 3) happens separately, *after* shared-element identification: the
/// shared-node/face walk in `shared_elements` needs the ghost cells still
/// present to look up their owning rank via `gen_to_domain`.
pub fn run<T: SerialTessellator>(
    serial: &T,
    dim: Dim,
    exchange: &GhostExchangeResult,
    mode: Mode<'_>,
) -> Result<Mesh> {
    let mesh = serial.tessellate(dim, &exchange.generators_extended, mode)?;
    let n_total = point_count(dim, &exchange.generators_extended);
    debug_assert_eq!(mesh.cells.len(), n_total);
    Ok(mesh)
}

/// spec.md §4.2 step 3: discard every cell beyond the first `n_local` (the
/// owned generators always sort first by construction of
/// `generators_extended` in `ghost_exchange`). Returns the (face, node)
/// remap tables so pre-trim shared-element indices can be translated.
pub fn trim(mesh: &mut Mesh, n_local: usize) -> (Vec<u32>, Vec<u32>) {
    let keep: Vec<bool> = (0..mesh.cells.len()).map(|i| i < n_local).collect();
    mesh.delete_cells(&keep)
}
