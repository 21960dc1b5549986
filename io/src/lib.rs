//! File formats for RHINO coregistration
//!
//! - Whitespace-delimited point text files (fiducials, headshape points)
//! - Text transform files with frame headers (and plain 4x4 FSL matrices)
//! - NIfTI-1 mask volumes (`.nii`, `.nii.gz`)
//! - Legacy ASCII VTK polydata meshes
//! - FreeSurfer binary triangle surfaces

pub mod freesurfer;
pub mod nifti;
pub mod points;
pub mod transform_file;
pub mod vtk;

pub use freesurfer::{read_surface, read_surface_file, write_surface, write_surface_file};
pub use nifti::{read_nifti_mask, read_nifti_mask_bytes, write_nifti_mask};
pub use points::{
    read_point_file, read_points, read_points_file, write_point_file, write_points,
    write_points_file,
};
pub use transform_file::{read_transform, read_transform_file, write_transform, write_transform_file};
pub use vtk::{read_vtk, read_vtk_file, write_vtk};

pub use rhino_core::{Error, Result};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Open an input file, reporting absence as [`Error::MissingInput`].
pub(crate) fn open_input(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::missing_input(path)),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn create_output(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}
