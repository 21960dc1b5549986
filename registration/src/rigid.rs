//! Least-squares rigid alignment of corresponding point sets (Kabsch).

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use rhino_core::{Affine, Error, Fiducials, PointCloud, Result};

/// Minimum number of correspondences for a rigid fit.
pub const MIN_CORRESPONDENCES: usize = 3;

/// Rigid transform mapping `source[i]` onto `target[i]` in the least-squares sense.
///
/// # Algorithm
///
/// 1. Center both sets on their centroids
/// 2. Accumulate the cross-covariance `H = sum(t_i * s_i^T)`
/// 3. SVD `H = U S V^T`, rotation `R = U V^T`
/// 4. If `det(R) < 0`, flip the left singular vector of the smallest singular value
/// 5. Translation `t = c_target - R c_source`
///
/// Exact for three non-collinear points. Near-collinear input is still solved,
/// only ill-conditioned.
pub fn rigid_transform_from_correspondences(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> Result<Matrix4<f64>> {
    if source.len() != target.len() {
        return Err(Error::InvalidInput(format!(
            "Correspondence count mismatch: {} source vs {} target points",
            source.len(),
            target.len()
        )));
    }
    if source.len() < MIN_CORRESPONDENCES {
        return Err(Error::insufficient(MIN_CORRESPONDENCES, source.len()));
    }

    let n = source.len() as f64;
    let source_centroid: Vector3<f64> = source.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n;
    let target_centroid: Vector3<f64> = target.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n;

    let mut covariance = Matrix3::<f64>::zeros();
    for (s, t) in source.iter().zip(target) {
        covariance += (t.coords - target_centroid) * (s.coords - source_centroid).transpose();
    }

    let svd = covariance.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| Error::Numerical("SVD did not produce U".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::Numerical("SVD did not produce V^T".to_string()))?;

    let mut rotation = u * v_t;

    // Ensure proper rotation (det = +1)
    if rotation.determinant() < 0.0 {
        let (weakest, _) = svd.singular_values.argmin();
        let mut u_corrected = u;
        u_corrected.column_mut(weakest).neg_mut();
        rotation = u_corrected * v_t;
    }

    let translation = target_centroid - rotation * source_centroid;

    let mut transformation = Matrix4::identity();
    transformation
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&rotation);
    transformation
        .fixed_view_mut::<3, 1>(0, 3)
        .copy_from(&translation);

    Ok(transformation)
}

/// Rigid transform from `source`'s frame to `target`'s frame, point `i` to point `i`.
pub fn solve_rigid(source: &PointCloud, target: &PointCloud) -> Result<Affine> {
    let matrix = rigid_transform_from_correspondences(source.points(), target.points())?;
    Affine::new(source.frame(), target.frame(), matrix)
}

/// Rigid transform aligning one fiducial triplet onto another, matched by name.
pub fn align_fiducials(source: &Fiducials, target: &Fiducials) -> Result<Affine> {
    let matrix = rigid_transform_from_correspondences(&source.points(), &target.points())?;
    Affine::new(source.frame(), target.frame(), matrix)
}
