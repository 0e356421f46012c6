//! Distributed Voronoi tessellation driver: ghost-generator exchange,
//! shared-element stitching, and bit-exact coordinate reconciliation across
//! cooperating processes.
//!
//! The serial Voronoi/Delaunay kernel, convex-hull construction, and
//! coordinate quantization are treated as external collaborators, consumed
//! through the [`tessellator::SerialTessellator`], [`hull::ConvexHullBuilder`]
//! and [`quantize::LatticeQuantizer`] traits respectively. [`reference`]
//! provides working implementations of all three so the driver is runnable
//! and testable without a production geometry kernel.

pub mod comm;
pub mod distributed;
pub mod error;
pub mod geometry;
pub mod hull;
pub mod mesh;
pub mod quantize;
pub mod reference;
pub mod tessellator;
pub mod wire;

pub use distributed::{DistributedTessellator, DistributedTessellatorOptions, SerialTessellatorHandle};
pub use error::{DistributedTessellationError, Result};
pub use geometry::{BoundingBox, Dim, Mode, Plc};
pub use mesh::Mesh;
pub use tessellator::SerialTessellator;
