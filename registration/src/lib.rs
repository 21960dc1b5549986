//! Rigid registration for RHINO coregistration
//!
//! This crate provides:
//! - Least-squares rigid alignment of corresponding points (Kabsch)
//! - Nearest-neighbour search over point clouds
//! - Point-to-point ICP (Iterative Closest Point)
//! - Multi-start ICP with seeded random perturbations

pub mod icp;
pub mod multistart;
pub mod nearest;
pub mod rigid;

pub use icp::{icp, icp_from, IcpResult, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
pub use multistart::{
    icp_multistart, IcpOptions, MultiStartResult, MAX_ROTATION_JITTER_DEG, MAX_TRANSLATION_JITTER_MM,
};
pub use nearest::NearestNeighbors;
pub use rigid::{
    align_fiducials, rigid_transform_from_correspondences, solve_rigid, MIN_CORRESPONDENCES,
};
