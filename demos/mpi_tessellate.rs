//! Minimal real-MPI example: every rank owns a slice of a generator set
//! read from the command line (or a small built-in default) and the
//! cluster jointly produces one box-bounded tessellation. Run under
//! `mpirun -n <P> target/release/mpi_tessellate`.

use distributed_voronoi::comm::mpi_backend::MpiCommunicator;
use distributed_voronoi::comm::Communicator;
use distributed_voronoi::reference::{FixedSpacingQuantizer, ReferenceConvexHullBuilder, ReferenceSerialTessellator};
use distributed_voronoi::{DistributedTessellator, DistributedTessellatorOptions, Dim};

fn main() {
    env_logger::init();
    let universe = mpi::initialize().expect("MPI failed to initialize");
    let comm = MpiCommunicator::world(&universe);

    let rank = comm.rank();
    let size = comm.size();

    // Split a small built-in unit-square point cloud round-robin across
    // ranks so the demo runs with any process count.
    let all_points = [
        0.1, 0.1, 0.9, 0.1, 0.1, 0.9, 0.9, 0.9, 0.5, 0.2, 0.2, 0.5, 0.8, 0.5, 0.5, 0.8,
    ];
    let dim = Dim::Two;
    let n_total = all_points.len() / dim.size();
    let own_points: Vec<f64> = (0..n_total)
        .filter(|i| (*i as u32) % size == rank)
        .flat_map(|i| all_points[i * dim.size()..i * dim.size() + dim.size()].to_vec())
        .collect();

    let serial = ReferenceSerialTessellator::default();
    let hull_builder = ReferenceConvexHullBuilder;
    let quantizer = FixedSpacingQuantizer;
    let options = DistributedTessellatorOptions::default();

    let driver = DistributedTessellator::new_borrowed(&serial, hull_builder, quantizer, &comm, options);
    let low = [0.0, 0.0];
    let high = [1.0, 1.0];
    match driver.tessellate_box(dim, &own_points, &low, &high) {
        Ok(mesh) => {
            println!(
                "rank {rank}/{size}: {} cells, {} neighbor domains",
                mesh.cells.len(),
                mesh.neighbor_domains.len()
            );
        }
        Err(e) => {
            eprintln!("rank {rank}/{size}: tessellate failed: {e}");
        }
    }
}
