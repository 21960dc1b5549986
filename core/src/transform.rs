//! Frame-tagged 4x4 homogeneous affine transforms.
//!
//! An [`Affine`] maps points from one [`CoordFrame`] to another. The bottom
//! row is always exactly `[0, 0, 0, 1]`; constructors reject anything else.
//! Composition follows frame bookkeeping: `a.then(&b)` requires
//! `a.to_frame() == b.from_frame()` and yields `a.from_frame() -> b.to_frame()`.

use std::fmt;

use nalgebra::{Matrix3, Matrix3xX, Matrix4, MatrixXx3, Point3, Rotation3, Vector3};

use crate::{CoordFrame, Error, PointCloud, Result};

const BOTTOM_ROW_TOLERANCE: f64 = 1e-9;
const SINGULAR_DETERMINANT: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    from: CoordFrame,
    to: CoordFrame,
    matrix: Matrix4<f64>,
}

impl Affine {
    /// Wrap a 4x4 matrix, validating the homogeneous bottom row.
    pub fn new(from: CoordFrame, to: CoordFrame, matrix: Matrix4<f64>) -> Result<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "Transform {} -> {} contains non-finite values",
                from, to
            )));
        }

        let expected = [0.0, 0.0, 0.0, 1.0];
        for (col, want) in expected.iter().enumerate() {
            if (matrix[(3, col)] - want).abs() > BOTTOM_ROW_TOLERANCE {
                return Err(Error::InvalidInput(format!(
                    "Transform {} -> {} has bottom row [{}, {}, {}, {}], expected [0, 0, 0, 1]",
                    from,
                    to,
                    matrix[(3, 0)],
                    matrix[(3, 1)],
                    matrix[(3, 2)],
                    matrix[(3, 3)]
                )));
            }
        }

        let mut matrix = matrix;
        matrix.fixed_view_mut::<1, 4>(3, 0).copy_from_slice(&expected);

        Ok(Self { from, to, matrix })
    }

    pub fn identity(frame: CoordFrame) -> Self {
        Self {
            from: frame,
            to: frame,
            matrix: Matrix4::identity(),
        }
    }

    /// Build from a linear (rotation/scale) block and a translation.
    pub fn from_parts(
        from: CoordFrame,
        to: CoordFrame,
        linear: &Matrix3<f64>,
        translation: &Vector3<f64>,
    ) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(linear);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { from, to, matrix }
    }

    /// Rigid transform from a rotation and a translation.
    pub fn rigid(
        from: CoordFrame,
        to: CoordFrame,
        rotation: &Rotation3<f64>,
        translation: &Vector3<f64>,
    ) -> Self {
        Self::from_parts(from, to, rotation.matrix(), translation)
    }

    pub fn from_frame(&self) -> CoordFrame {
        self.from
    }

    pub fn to_frame(&self) -> CoordFrame {
        self.to
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Same matrix, different frame labels.
    pub fn with_frames(self, from: CoordFrame, to: CoordFrame) -> Self {
        Self { from, to, ..self }
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.linear() * point.coords + self.translation())
    }

    /// Apply to a point cloud, preserving point count and order.
    ///
    /// # Panics
    ///
    /// Panics if the cloud is not in this transform's source frame.
    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        assert!(
            cloud.frame() == self.from,
            "cannot apply {} -> {} transform to a point cloud in frame {}",
            self.from,
            self.to,
            cloud.frame()
        );
        let linear = self.linear();
        let translation = self.translation();
        let points = cloud
            .points()
            .iter()
            .map(|p| Point3::from(linear * p.coords + translation))
            .collect();
        PointCloud::new(self.to, points)
    }

    /// Apply to a 3xN matrix of column points.
    pub fn apply_columns(&self, points: &Matrix3xX<f64>) -> Matrix3xX<f64> {
        let translation = self.translation();
        let mut out = self.linear() * points;
        for mut column in out.column_iter_mut() {
            column += translation;
        }
        out
    }

    /// Apply to an Nx3 matrix of row points.
    pub fn apply_rows(&self, points: &MatrixXx3<f64>) -> MatrixXx3<f64> {
        let translation = self.translation().transpose();
        let mut out = points * self.linear().transpose();
        for mut row in out.row_iter_mut() {
            row += translation;
        }
        out
    }

    /// Exact affine inverse.
    ///
    /// Fails with [`Error::SingularTransform`] when the linear block is not
    /// invertible.
    pub fn inverse(&self) -> Result<Affine> {
        let linear = self.linear();
        let det = linear.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT {
            return Err(Error::SingularTransform(format!(
                "{} -> {} transform has determinant {}",
                self.from, self.to, det
            )));
        }
        let inv = linear.try_inverse().ok_or_else(|| {
            Error::SingularTransform(format!(
                "{} -> {} transform linear block is not invertible",
                self.from, self.to
            ))
        })?;
        let translation = -(inv * self.translation());
        Ok(Self::from_parts(self.to, self.from, &inv, &translation))
    }

    /// `self` followed by `next`.
    ///
    /// # Panics
    ///
    /// Panics if `next` does not start in the frame `self` ends in.
    pub fn then(&self, next: &Affine) -> Affine {
        assert!(
            self.to == next.from,
            "cannot compose {} -> {} with {} -> {}",
            self.from,
            self.to,
            next.from,
            next.to
        );
        Self {
            from: self.from,
            to: next.to,
            matrix: next.matrix * self.matrix,
        }
    }

    /// Rescale the translation of a metre-based transform to millimetres.
    pub fn meters_to_millimeters(&self) -> Affine {
        let mut out = *self;
        out.matrix
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&(self.translation() * 1000.0));
        out
    }

    /// Rotation angle of the linear block in degrees, assuming it is a rotation.
    pub fn rotation_angle_deg(&self) -> f64 {
        let cos = ((self.linear().trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
        cos.acos().to_degrees()
    }

    /// Whether the linear block is orthonormal with determinant +1.
    pub fn is_rigid(&self, tolerance: f64) -> bool {
        let linear = self.linear();
        let orthogonality = (linear.transpose() * linear - Matrix3::identity()).abs().max();
        orthogonality < tolerance && (linear.determinant() - 1.0).abs() < tolerance
    }
}

impl fmt::Display for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}{}", self.from, self.to, self.matrix)
    }
}

/// Apply `transform` to `points`.
pub fn apply_transform(transform: &Affine, points: &PointCloud) -> PointCloud {
    transform.apply(points)
}

/// Exact inverse of `transform`.
pub fn invert(transform: &Affine) -> Result<Affine> {
    transform.inverse()
}

/// `first` followed by `second`; frames must chain.
pub fn compose(first: &Affine, second: &Affine) -> Affine {
    first.then(second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transform() -> Affine {
        let rotation = Rotation3::from_euler_angles(0.3, -0.2, 1.1);
        Affine::rigid(
            CoordFrame::Mri,
            CoordFrame::Head,
            &rotation,
            &Vector3::new(4.0, -12.5, 30.0),
        )
    }

    fn sample_cloud(frame: CoordFrame) -> PointCloud {
        PointCloud::new(
            frame,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, -3.0, 2.5),
                Point3::new(-7.0, 8.0, 1.0),
                Point3::new(60.0, 41.0, -22.0),
            ],
        )
    }

    fn assert_clouds_close(a: &PointCloud, b: &PointCloud, tol: f64) {
        assert_eq!(a.len(), b.len());
        for (p, q) in a.points().iter().zip(b.points()) {
            assert!((p - q).norm() < tol, "{} vs {}", p, q);
        }
    }

    #[test]
    fn test_new_rejects_bad_bottom_row() {
        let mut m = Matrix4::identity();
        m[(3, 0)] = 0.5;
        let err = Affine::new(CoordFrame::Mri, CoordFrame::Head, m).unwrap_err();
        assert!(err.to_string().contains("bottom row"));

        m[(3, 0)] = f64::NAN;
        assert!(Affine::new(CoordFrame::Mri, CoordFrame::Head, m).is_err());
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = sample_transform();
        let cloud = sample_cloud(CoordFrame::Mri);
        let back = t.inverse().unwrap().apply(&t.apply(&cloud));
        assert_eq!(back.frame(), CoordFrame::Mri);
        assert_clouds_close(&back, &cloud, 1e-9);
    }

    #[test]
    fn test_inverse_of_scaled_affine() {
        let linear = Matrix3::new(2.0, 0.1, 0.0, 0.0, 0.5, 0.3, 0.0, 0.0, 1.5);
        let t = Affine::from_parts(
            CoordFrame::MriVoxel,
            CoordFrame::Mri,
            &linear,
            &Vector3::new(-90.0, -126.0, -72.0),
        );
        let product = t.then(&t.inverse().unwrap());
        assert!((product.matrix() - Matrix4::identity()).abs().max() < 1e-12);
    }

    #[test]
    fn test_inverse_singular() {
        let linear = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        let t = Affine::from_parts(CoordFrame::Mni, CoordFrame::Mri, &linear, &Vector3::zeros());
        assert!(matches!(t.inverse(), Err(Error::SingularTransform(_))));
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let a = sample_transform();
        let b = Affine::rigid(
            CoordFrame::Head,
            CoordFrame::MegDevice,
            &Rotation3::from_axis_angle(&Vector3::z_axis(), 0.4),
            &Vector3::new(0.0, 0.0, -40.0),
        );
        let cloud = sample_cloud(CoordFrame::Mri);

        let composed = compose(&a, &b);
        assert_eq!(composed.from_frame(), CoordFrame::Mri);
        assert_eq!(composed.to_frame(), CoordFrame::MegDevice);
        assert_clouds_close(&composed.apply(&cloud), &b.apply(&a.apply(&cloud)), 1e-9);
    }

    #[test]
    #[should_panic(expected = "cannot compose")]
    fn test_compose_frame_mismatch_panics() {
        let a = sample_transform();
        let _ = a.then(&a);
    }

    #[test]
    #[should_panic(expected = "cannot apply")]
    fn test_apply_frame_mismatch_panics() {
        let _ = sample_transform().apply(&sample_cloud(CoordFrame::Head));
    }

    #[test]
    fn test_row_and_column_orientations_agree() {
        let t = sample_transform();
        let cloud = sample_cloud(CoordFrame::Mri);

        let rows = t.apply_rows(&cloud.to_rows());
        let cols = t.apply_columns(&cloud.to_columns());
        let expected = t.apply(&cloud);

        assert_eq!(rows.nrows(), cloud.len());
        assert_eq!(cols.ncols(), cloud.len());
        for (i, p) in expected.points().iter().enumerate() {
            for axis in 0..3 {
                assert!((rows[(i, axis)] - p[axis]).abs() < 1e-9);
                assert!((cols[(axis, i)] - p[axis]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_meters_to_millimeters_scales_translation_only() {
        let t = sample_transform();
        let metres = Affine::from_parts(
            CoordFrame::MegDevice,
            CoordFrame::Head,
            &t.linear(),
            &Vector3::new(0.001, 0.002, -0.04),
        );
        let mm = metres.meters_to_millimeters();
        assert_eq!(mm.linear(), metres.linear());
        assert!((mm.translation() - Vector3::new(1.0, 2.0, -40.0)).norm() < 1e-12);
    }

    #[test]
    fn test_rigid_helpers() {
        let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), 10f64.to_radians());
        let t = Affine::rigid(CoordFrame::Mri, CoordFrame::Head, &rotation, &Vector3::zeros());
        assert!(t.is_rigid(1e-9));
        assert!((t.rotation_angle_deg() - 10.0).abs() < 1e-9);

        let scaled = Affine::from_parts(
            CoordFrame::MriVoxel,
            CoordFrame::Mri,
            &(Matrix3::identity() * 2.0),
            &Vector3::zeros(),
        );
        assert!(!scaled.is_rigid(1e-6));
    }
}
