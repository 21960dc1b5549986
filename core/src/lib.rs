//! Core types for RHINO coregistration
//!
//! - Coordinate frames and frame-tagged affine transforms
//! - Point clouds, fiducial triplets and triangle meshes
//! - Mask volumes and their voxel-index point clouds
//!
//! All coordinates are in millimetres.

pub mod error;
pub mod fiducials;
pub mod frames;
pub mod mesh;
pub mod point_cloud;
pub mod runtime;
pub mod transform;
pub mod volume;

pub use error::{Error, Result};
pub use fiducials::{FiducialKind, Fiducials, MNI_LPA, MNI_NASION, MNI_RPA};
pub use frames::CoordFrame;
pub use mesh::TriangleMesh;
pub use point_cloud::PointCloud;
pub use runtime::{
    cpu_threads_from_env, current_cpu_threads, init_global_thread_pool, CPU_THREADS_ENV,
};
pub use transform::{apply_transform, compose, invert, Affine};
pub use volume::{mask_to_point_cloud, MaskVolume};
