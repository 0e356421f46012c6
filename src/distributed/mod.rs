//! The distributed tessellation driver (spec.md §§2, 4, 6). Everything
//! under this module is "core": the protocol that composes independent
//! local Voronoi computations into a globally consistent mesh using only a
//! serial tessellator and a [`crate::comm::Communicator`].

mod ghost_exchange;
mod overtessellate;
mod reconcile;
mod shared_elements;
mod verify;

use log::debug;

use crate::comm::Communicator;
use crate::error::Result;
use crate::geometry::{Dim, Mode, Plc};
use crate::hull::ConvexHullBuilder;
use crate::mesh::Mesh;
use crate::quantize::LatticeQuantizer;
use crate::tessellator::SerialTessellator;

/// Whether the driver owns the serial tessellator's lifetime (spec.md §6
/// `assume_control`). Expressed as an enum rather than a boolean flag on a
/// raw pointer, the same tagged-sum preference the teacher crate applies to
/// its own `Dimensionality` type: the two states carry genuinely different
/// data (an owned box vs. a borrow), not just a flag to check.
pub enum SerialTessellatorHandle<'a, T: SerialTessellator> {
    Owned(Box<T>),
    Borrowed(&'a T),
}

impl<'a, T: SerialTessellator> SerialTessellatorHandle<'a, T> {
    fn get(&self) -> &T {
        match self {
            SerialTessellatorHandle::Owned(b) => b,
            SerialTessellatorHandle::Borrowed(r) => r,
        }
    }
}

/// Construction options for the distributed driver (spec.md §6).
pub struct DistributedTessellatorOptions {
    /// If `false`, skip §§4.3-4.6 entirely: only `mesh.cells` is filled and
    /// no ghost bookkeeping (shared nodes/faces, neighbor domains) is
    /// computed.
    pub build_communication_info: bool,
    /// Run the debug-only symmetry/consistency checks (spec.md §9 Supplemented
    /// features) even in a release build. Defaults to `cfg!(debug_assertions)`.
    pub verify: bool,
}

impl Default for DistributedTessellatorOptions {
    fn default() -> Self {
        DistributedTessellatorOptions {
            build_communication_info: true,
            verify: cfg!(debug_assertions),
        }
    }
}

pub struct DistributedTessellator<'a, T, H, Q, C>
where
    T: SerialTessellator,
    H: ConvexHullBuilder,
    Q: LatticeQuantizer,
    C: Communicator,
{
    serial: SerialTessellatorHandle<'a, T>,
    hull_builder: H,
    quantizer: Q,
    comm: &'a C,
    options: DistributedTessellatorOptions,
}

impl<'a, T, H, Q, C> DistributedTessellator<'a, T, H, Q, C>
where
    T: SerialTessellator,
    H: ConvexHullBuilder,
    Q: LatticeQuantizer,
    C: Communicator,
{
    pub fn new_owned(
        serial_tessellator: T,
        hull_builder: H,
        quantizer: Q,
        comm: &'a C,
        options: DistributedTessellatorOptions,
    ) -> Self {
        DistributedTessellator {
            serial: SerialTessellatorHandle::Owned(Box::new(serial_tessellator)),
            hull_builder,
            quantizer,
            comm,
            options,
        }
    }

    pub fn new_borrowed(
        serial_tessellator: &'a T,
        hull_builder: H,
        quantizer: Q,
        comm: &'a C,
        options: DistributedTessellatorOptions,
    ) -> Self {
        DistributedTessellator {
            serial: SerialTessellatorHandle::Borrowed(serial_tessellator),
            hull_builder,
            quantizer,
            comm,
            options,
        }
    }

    pub fn tessellate(&self, dim: Dim, points: &[f64], mode: Mode<'_>) -> Result<Mesh> {
        match mode {
            Mode::Unbounded => self.tessellate_unbounded(dim, points),
            Mode::Box { low, high } => self.tessellate_box(dim, points, low, high),
            Mode::Plc { plc_points, plc } => self.tessellate_plc(dim, points, plc_points, plc),
        }
    }

    pub fn tessellate_unbounded(&self, dim: Dim, points: &[f64]) -> Result<Mesh> {
        self.run(dim, points, Mode::Unbounded)
    }

    pub fn tessellate_box(&self, dim: Dim, points: &[f64], low: &[f64], high: &[f64]) -> Result<Mesh> {
        self.run(dim, points, Mode::Box { low, high })
    }

    pub fn tessellate_plc(&self, dim: Dim, points: &[f64], plc_points: &[f64], plc: &Plc) -> Result<Mesh> {
        self.run(dim, points, Mode::Plc { plc_points, plc })
    }

    fn run(&self, dim: Dim, points: &[f64], mode: Mode<'_>) -> Result<Mesh> {
        let serial = self.serial.get();
        let rank = self.comm.rank();
        let n_local = crate::geometry::point_count(dim, points);
        debug!("rank {rank}: starting tessellate, {n_local} own generators");

        let exchange = ghost_exchange::exchange(
            self.comm,
            &self.hull_builder,
            serial,
            dim,
            points,
            mode,
        )?;
        debug!(
            "rank {rank}: ghost exchange done, {} ghosts from {} neighbors",
            exchange.generators_extended.len() / dim.size() - n_local,
            exchange.neighbor_domains.len()
        );

        let bbox = overtessellate::global_bounding_box(self.comm, dim, points, mode)?;
        let mut mesh = overtessellate::run(serial, dim, &exchange, mode)?;

        if !self.options.build_communication_info {
            debug!("rank {rank}: build_communication_info=false, skipping §§4.3-4.6");
            overtessellate::trim(&mut mesh, n_local);
            return Ok(mesh);
        }

        // Shared-element identification walks ghost cells via
        // `gen_to_domain`, so it must run before the trim renumbers/drops
        // them (see `overtessellate::trim`'s doc comment).
        let neighbor_domains = exchange.neighbor_domains.clone();
        let mut shared =
            shared_elements::identify(&mesh, &exchange.gen_to_domain, &neighbor_domains, n_local, rank);

        let (face_remap, node_remap) = overtessellate::trim(&mut mesh, n_local);
        shared_elements::remap(&mut shared, &face_remap, &node_remap);
        shared_elements::order_deterministically(
            &mesh,
            &bbox,
            serial.degeneracy(),
            &self.quantizer,
            &neighbor_domains,
            &mut shared,
        );

        mesh.neighbor_domains = neighbor_domains;
        mesh.shared_nodes = shared.shared_nodes;
        mesh.shared_faces = shared.shared_faces;

        reconcile::reconcile(self.comm, &mut mesh)?;
        reconcile::prune_empty_neighbors(&mut mesh);

        if self.options.verify {
            if let Err(e) = verify::verify(self.comm, &mesh) {
                log::warn!("rank {rank}: post-condition verification failed: {e}");
                return Err(e);
            }
        }

        debug!("rank {rank}: tessellate complete, {} cells", mesh.cells.len());
        Ok(mesh)
    }
}
