//! Named coordinate frames.
//!
//! Every transform and point cloud carries the frame it lives in. The chain
//! used by coregistration is:
//!
//! | From        | Transform          | To          |
//! |-------------|--------------------|-------------|
//! | MEG device  | `dev_head_t`       | head        |
//! | head        | `head_mri_t`       | MRI (native)|
//! | MRI voxel   | `mrivoxel_mri_t`   | MRI (native)|
//! | MNI         | `mni_mri_t`        | MRI (native)|
//! | FSL scaled voxel | mesh header   | MRI voxel   |
//!
//! All frames are expressed in millimetres. Transforms coming from MEG
//! acquisition software are usually in metres and must be rescaled with
//! [`crate::Affine::meters_to_millimeters`] before use.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Coordinate frame tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordFrame {
    /// MEG sensor array (device) frame
    MegDevice,
    /// Polhemus digitisation frame, equivalent to the MEG head frame
    Head,
    /// Native structural MRI frame in mm
    Mri,
    /// Voxel indices of the native structural MRI
    MriVoxel,
    /// MNI standard space in mm
    Mni,
    /// FSL "scaled voxel" mm, as written by BET surface meshes: voxel index
    /// times pixdim, with x flipped for neurologically stored images
    FslScaledVoxel,
}

impl CoordFrame {
    pub const ALL: [CoordFrame; 6] = [
        CoordFrame::MegDevice,
        CoordFrame::Head,
        CoordFrame::Mri,
        CoordFrame::MriVoxel,
        CoordFrame::Mni,
        CoordFrame::FslScaledVoxel,
    ];

    /// Short name used in transform files
    pub fn name(&self) -> &'static str {
        match self {
            CoordFrame::MegDevice => "meg",
            CoordFrame::Head => "head",
            CoordFrame::Mri => "mri",
            CoordFrame::MriVoxel => "mri_voxel",
            CoordFrame::Mni => "mni_tal",
            CoordFrame::FslScaledVoxel => "fsl_scaled_voxel",
        }
    }
}

impl fmt::Display for CoordFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoordFrame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meg" | "device" => Ok(CoordFrame::MegDevice),
            "head" | "polhemus" => Ok(CoordFrame::Head),
            "mri" | "native" => Ok(CoordFrame::Mri),
            "mri_voxel" | "mrivoxel" => Ok(CoordFrame::MriVoxel),
            "mni_tal" | "mni" => Ok(CoordFrame::Mni),
            "fsl_scaled_voxel" | "flirt" => Ok(CoordFrame::FslScaledVoxel),
            other => Err(Error::Parse(format!("Unknown coordinate frame '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_names_round_trip() {
        for frame in CoordFrame::ALL {
            let parsed: CoordFrame = frame.name().parse().unwrap();
            assert_eq!(parsed, frame);
        }
    }

    #[test]
    fn test_frame_aliases() {
        assert_eq!("polhemus".parse::<CoordFrame>().unwrap(), CoordFrame::Head);
        assert_eq!(" MNI ".parse::<CoordFrame>().unwrap(), CoordFrame::Mni);
        assert!("talairach".parse::<CoordFrame>().is_err());
    }
}
