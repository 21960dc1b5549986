//! Anatomical fiducial triplets (nasion, right and left preauricular points).

use std::fmt;

use nalgebra::Point3;

use crate::{Affine, CoordFrame, PointCloud};

/// Nasion in MNI standard space, mm
pub const MNI_NASION: [f64; 3] = [1.0, 85.0, -41.0];
/// Right preauricular point in MNI standard space, mm
pub const MNI_RPA: [f64; 3] = [83.0, -20.0, -65.0];
/// Left preauricular point in MNI standard space, mm
pub const MNI_LPA: [f64; 3] = [-83.0, -20.0, -65.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FiducialKind {
    Nasion,
    Rpa,
    Lpa,
}

impl FiducialKind {
    /// Canonical ordering used whenever fiducials are flattened.
    pub const ALL: [FiducialKind; 3] = [FiducialKind::Nasion, FiducialKind::Rpa, FiducialKind::Lpa];

    pub fn name(&self) -> &'static str {
        match self {
            FiducialKind::Nasion => "nasion",
            FiducialKind::Rpa => "rpa",
            FiducialKind::Lpa => "lpa",
        }
    }
}

impl fmt::Display for FiducialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fiducials {
    frame: CoordFrame,
    nasion: Point3<f64>,
    rpa: Point3<f64>,
    lpa: Point3<f64>,
}

impl Fiducials {
    pub fn new(frame: CoordFrame, nasion: Point3<f64>, rpa: Point3<f64>, lpa: Point3<f64>) -> Self {
        Self {
            frame,
            nasion,
            rpa,
            lpa,
        }
    }

    /// The standard fiducial locations on the MNI152 template.
    pub fn standard_mni() -> Self {
        Self::new(
            CoordFrame::Mni,
            Point3::from(MNI_NASION),
            Point3::from(MNI_RPA),
            Point3::from(MNI_LPA),
        )
    }

    pub fn frame(&self) -> CoordFrame {
        self.frame
    }

    pub fn get(&self, kind: FiducialKind) -> Point3<f64> {
        match kind {
            FiducialKind::Nasion => self.nasion,
            FiducialKind::Rpa => self.rpa,
            FiducialKind::Lpa => self.lpa,
        }
    }

    /// Points in `[nasion, rpa, lpa]` order.
    pub fn points(&self) -> [Point3<f64>; 3] {
        [self.nasion, self.rpa, self.lpa]
    }

    pub fn to_point_cloud(&self) -> PointCloud {
        PointCloud::new(self.frame, self.points().to_vec())
    }

    /// Map every fiducial through `transform`.
    ///
    /// # Panics
    ///
    /// Panics if the fiducials are not in the transform's source frame.
    pub fn transformed(&self, transform: &Affine) -> Fiducials {
        assert!(
            transform.from_frame() == self.frame,
            "cannot apply {} -> {} transform to fiducials in frame {}",
            transform.from_frame(),
            transform.to_frame(),
            self.frame
        );
        Self::new(
            transform.to_frame(),
            transform.transform_point(&self.nasion),
            transform.transform_point(&self.rpa),
            transform.transform_point(&self.lpa),
        )
    }

    /// Shape quality of the fiducial triangle in `[0, 1]`.
    ///
    /// 1 for an equilateral triangle, 0 for collinear (or coincident) points.
    pub fn triangle_quality(&self) -> f64 {
        let ab = self.rpa - self.nasion;
        let ac = self.lpa - self.nasion;
        let bc = self.lpa - self.rpa;
        let area = 0.5 * ab.cross(&ac).norm();
        let sum_sq = ab.norm_squared() + ac.norm_squared() + bc.norm_squared();
        if sum_sq <= f64::EPSILON {
            return 0.0;
        }
        (4.0 * 3f64.sqrt() * area / sum_sq).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_standard_mni_order() {
        let fids = Fiducials::standard_mni();
        assert_eq!(fids.frame(), CoordFrame::Mni);
        assert_eq!(fids.points()[0], Point3::new(1.0, 85.0, -41.0));
        assert_eq!(fids.get(FiducialKind::Lpa), Point3::new(-83.0, -20.0, -65.0));
        assert_eq!(
            fids.to_point_cloud().points()[1],
            fids.get(FiducialKind::Rpa)
        );
    }

    #[test]
    fn test_transformed_changes_frame() {
        let shift = Affine::from_parts(
            CoordFrame::Mni,
            CoordFrame::Mri,
            &nalgebra::Matrix3::identity(),
            &Vector3::new(1.0, 2.0, 3.0),
        );
        let moved = Fiducials::standard_mni().transformed(&shift);
        assert_eq!(moved.frame(), CoordFrame::Mri);
        assert_eq!(moved.get(FiducialKind::Nasion), Point3::new(2.0, 87.0, -38.0));
    }

    #[test]
    fn test_triangle_quality() {
        let h = 3f64.sqrt() / 2.0;
        let equilateral = Fiducials::new(
            CoordFrame::Head,
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, h, 0.0),
        );
        assert!((equilateral.triangle_quality() - 1.0).abs() < 1e-12);

        let collinear = Fiducials::new(
            CoordFrame::Head,
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(collinear.triangle_quality() < 1e-12);

        let coincident = Fiducials::new(
            CoordFrame::Head,
            Point3::origin(),
            Point3::origin(),
            Point3::origin(),
        );
        assert_eq!(coincident.triangle_quality(), 0.0);

        assert!(Fiducials::standard_mni().triangle_quality() > 0.3);
    }
}
