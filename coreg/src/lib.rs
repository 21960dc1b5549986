//! MEG/EEG to structural MRI coregistration
//!
//! Aligns digitized head points (fiducials and headshape, head space) with a
//! subject's structural MRI (native space):
//! - Standard MNI fiducials are mapped into native space
//! - A rigid fiducial fit gives the initial native-to-head transform
//! - Multi-start ICP over the scalp surface refines it
//! - Transforms, fiducials and surfaces are published per subject

pub mod config;
pub mod paths;
pub mod pipeline;
pub mod store;

pub use config::CoregConfig;
pub use paths::{CoregPaths, SubjectPaths, SurfaceFiles, SurfacePaths};
pub use pipeline::{
    compute, coregister, standardize_fiducials, CoregError, CoregInputs, CoregResult, Stage,
};
pub use store::{surface_to_native, FileStore, Polhemus, SubjectStore};
