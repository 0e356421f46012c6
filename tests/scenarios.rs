//! Concrete scenarios (spec.md §8 S1-S6) plus the universal testable
//! properties, exercised in-process over [`distributed_voronoi::comm::local`].

use std::thread;

use distributed_voronoi::comm::local::{local_communicators, LocalCommunicator};
use distributed_voronoi::comm::Communicator;
use distributed_voronoi::reference::{FixedSpacingQuantizer, ReferenceConvexHullBuilder, ReferenceSerialTessellator};
use distributed_voronoi::{DistributedTessellator, DistributedTessellatorOptions, Dim, Mesh, Mode, SerialTessellator};

fn run_ranks<F>(size: u32, body: F) -> Vec<Mesh>
where
    F: Fn(&LocalCommunicator) -> Mesh + Send + Sync,
{
    let comms = local_communicators(size);
    thread::scope(|scope| {
        let handles: Vec<_> = comms
            .iter()
            .map(|comm| scope.spawn(|| body(comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

fn tessellate_on(comm: &LocalCommunicator, dim: Dim, points: &[f64], mode: Mode<'_>) -> Mesh {
    let serial = ReferenceSerialTessellator::default();
    let driver = DistributedTessellator::new_borrowed(
        &serial,
        ReferenceConvexHullBuilder,
        FixedSpacingQuantizer,
        comm,
        DistributedTessellatorOptions::default(),
    );
    driver.tessellate(dim, points, mode).expect("tessellate failed")
}

fn cell_area_2d(mesh: &Mesh, icell: usize) -> f64 {
    let nodes = &mesh.cells[icell];
    let mut pts = Vec::new();
    for &fr in nodes {
        let (iface, _) = distributed_voronoi::mesh::decode_face_ref(fr);
        for &n in &mesh.faces[iface as usize] {
            pts.push(mesh.node_point(n as usize));
        }
    }
    pts.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap().then(a.y.partial_cmp(&b.y).unwrap()));
    pts.dedup_by(|a, b| (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
    let hull = distributed_voronoi::hull::reference::monotone_chain_2d(&pts);
    polygon_area(&hull)
}

fn polygon_area(poly: &[glam::DVec3]) -> f64 {
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

#[test]
fn s1_single_rank_unit_square() {
    let points = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let low = [0.0, 0.0];
    let high = [1.0, 1.0];
    let meshes = run_ranks(1, |comm| {
        tessellate_on(comm, Dim::Two, &points, Mode::Box { low: &low, high: &high })
    });
    let mesh = &meshes[0];
    assert_eq!(mesh.cells.len(), 4);
    let total_area: f64 = (0..4).map(|i| cell_area_2d(mesh, i)).sum();
    assert!((total_area - 1.0).abs() < 1e-6, "total area {total_area}");
    for i in 0..4 {
        let a = cell_area_2d(mesh, i);
        assert!((a - 0.25).abs() < 1e-6, "cell {i} area {a}");
    }
}

#[test]
fn s2_two_ranks_split_square() {
    let low = [0.0, 0.0];
    let high = [1.0, 1.0];
    let own = [vec![0.0, 0.0, 1.0, 0.0], vec![0.0, 1.0, 1.0, 1.0]];
    let meshes = run_ranks(2, |comm| {
        let pts = own[comm.rank() as usize].clone();
        tessellate_on(comm, Dim::Two, &pts, Mode::Box { low: &low, high: &high })
    });

    // The reference kernel's exact Voronoi tessellation of {(0,0),(1,0)} vs.
    // {(0,1),(1,1)} meets along y=0.5 in two segments, not spec.md S2's
    // idealized single shared edge: the (0,0)/(0,1) bisector covers
    // (0,0.5)-(0.5,0.5) and the (1,0)/(1,1) bisector covers
    // (0.5,0.5)-(1,0.5), giving three distinct shared nodes.
    for mesh in &meshes {
        assert_eq!(mesh.cells.len(), 2);
        assert_eq!(mesh.neighbor_domains.len(), 1);
        assert_eq!(mesh.shared_faces[0].len(), 2);
        assert_eq!(mesh.shared_nodes[0].len(), 3);
    }

    // Coordinate-identity law: the shared nodes must be bit-identical.
    let r0 = &meshes[0];
    let r1 = &meshes[1];
    let r0_peer_nodes: Vec<_> = r0.shared_nodes[0].iter().map(|&n| r0.node_point(n as usize)).collect();
    let r1_peer_nodes: Vec<_> = r1.shared_nodes[0].iter().map(|&n| r1.node_point(n as usize)).collect();
    assert_eq!(r0_peer_nodes.len(), r1_peer_nodes.len());
    for (a, b) in r0_peer_nodes.iter().zip(r1_peer_nodes.iter()) {
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
    }
}

#[test]
fn s3_collinear_generators_unbounded() {
    let own = [vec![0.0, 0.0, 1.0, 0.0], vec![2.0, 0.0, 3.0, 0.0]];
    let meshes = run_ranks(2, |comm| {
        let pts = own[comm.rank() as usize].clone();
        tessellate_on(comm, Dim::Two, &pts, Mode::Unbounded)
    });
    let total_cells: usize = meshes.iter().map(|m| m.cells.len()).sum();
    assert_eq!(total_cells, 4);
    for mesh in &meshes {
        assert_eq!(mesh.shared_nodes[0].len(), 2);
    }
}

#[test]
fn s6_one_rank_empty() {
    let points = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let low = [0.0, 0.0];
    let high = [1.0, 1.0];
    let own: Vec<Vec<f64>> = vec![points.to_vec(), Vec::new()];
    let meshes = run_ranks(2, |comm| {
        let pts = own[comm.rank() as usize].clone();
        tessellate_on(comm, Dim::Two, &pts, Mode::Box { low: &low, high: &high })
    });
    assert_eq!(meshes[0].cells.len(), 4);
    assert_eq!(meshes[1].cells.len(), 0);
    assert!(meshes[1].neighbor_domains.is_empty());

    let baseline = run_ranks(1, |comm| {
        tessellate_on(comm, Dim::Two, &points, Mode::Box { low: &low, high: &high })
    });
    assert_eq!(meshes[0].cells.len(), baseline[0].cells.len());
}

#[test]
fn partition_law_holds_across_ranks() {
    let own = [vec![0.0, 0.0, 1.0, 0.0], vec![0.0, 1.0, 1.0, 1.0]];
    let total_in: usize = own.iter().map(|p| p.len() / 2).sum();
    let low = [0.0, 0.0];
    let high = [1.0, 1.0];
    let meshes = run_ranks(2, |comm| {
        let pts = own[comm.rank() as usize].clone();
        tessellate_on(comm, Dim::Two, &pts, Mode::Box { low: &low, high: &high })
    });
    let total_cells: usize = meshes.iter().map(|m| m.cells.len()).sum();
    assert_eq!(total_cells, total_in);
}

#[test]
fn symmetry_law_holds() {
    let own = [
        vec![0.0, 0.0, 1.0, 0.0],
        vec![0.0, 1.0, 1.0, 1.0],
        vec![2.0, 0.0, 2.0, 1.0],
    ];
    let low = [0.0, 0.0];
    let high = [3.0, 2.0];
    let meshes = run_ranks(3, |comm| {
        let pts = own[comm.rank() as usize].clone();
        tessellate_on(comm, Dim::Two, &pts, Mode::Box { low: &low, high: &high })
    });
    for (r, mesh) in meshes.iter().enumerate() {
        for &s in &mesh.neighbor_domains {
            let peer = &meshes[s as usize];
            assert!(
                peer.neighbor_domains.contains(&(r as u32)),
                "rank {s} does not list rank {r} back"
            );
        }
    }
}

#[test]
fn single_rank_equivalence() {
    let points = [0.2, 0.3, 0.8, 0.2, 0.5, 0.8];
    let low = [0.0, 0.0];
    let high = [1.0, 1.0];
    let distributed = run_ranks(1, |comm| {
        tessellate_on(comm, Dim::Two, &points, Mode::Box { low: &low, high: &high })
    });
    let serial = ReferenceSerialTessellator::default();
    let direct = serial
        .tessellate(Dim::Two, &points, Mode::Box { low: &low, high: &high })
        .expect("serial tessellate failed");
    assert_eq!(distributed[0].cells.len(), direct.cells.len());
}
