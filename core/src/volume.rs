//! Binary mask volumes and their conversion to point clouds.

use nalgebra::{Matrix4, Point3};

use crate::{Affine, CoordFrame, Error, PointCloud, Result};

/// A 3D mask stored x-fastest (NIfTI storage order) with its voxel-to-native affine.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskVolume {
    dims: [usize; 3],
    data: Vec<f32>,
    voxel_to_mri: Affine,
}

impl MaskVolume {
    pub fn new(dims: [usize; 3], data: Vec<f32>, voxel_to_mri: Affine) -> Result<Self> {
        let expected = dims[0] * dims[1] * dims[2];
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "Mask data length {} does not match dimensions {}x{}x{}",
                data.len(),
                dims[0],
                dims[1],
                dims[2]
            )));
        }
        if voxel_to_mri.from_frame() != CoordFrame::MriVoxel
            || voxel_to_mri.to_frame() != CoordFrame::Mri
        {
            return Err(Error::InvalidInput(format!(
                "Mask affine must map mri_voxel -> mri, got {} -> {}",
                voxel_to_mri.from_frame(),
                voxel_to_mri.to_frame()
            )));
        }
        Ok(Self {
            dims,
            data,
            voxel_to_mri,
        })
    }

    /// Build a mask from a predicate over voxel indices.
    pub fn from_fn<F>(dims: [usize; 3], voxel_to_mri: Affine, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize, usize) -> bool,
    {
        let mut data = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    data.push(if f(i, j, k) { 1.0 } else { 0.0 });
                }
            }
        }
        Self::new(dims, data, voxel_to_mri)
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn voxel_to_mri(&self) -> &Affine {
        &self.voxel_to_mri
    }

    pub fn value(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        let [nx, ny, nz] = self.dims;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        Some(self.data[i + nx * (j + ny * k)])
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| **v != 0.0).count()
    }

    /// Map FSL scaled-voxel mm (BET mesh vertices) back to voxel indices.
    ///
    /// FSL scales each index by the voxel size, and for images whose affine
    /// has a positive determinant (neurological storage) also flips x.
    pub fn scaled_voxel_to_voxel(&self) -> Result<Affine> {
        let linear = self.voxel_to_mri.linear();
        let mut matrix = Matrix4::identity();
        for axis in 0..3 {
            let size = linear.column(axis).norm();
            if !(size.is_finite() && size > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "Mask voxel size along axis {} is {}",
                    axis, size
                )));
            }
            matrix[(axis, axis)] = 1.0 / size;
        }
        if linear.determinant() > 0.0 {
            matrix[(0, 0)] = -matrix[(0, 0)];
            matrix[(0, 3)] = self.dims[0] as f64 - 1.0;
        }
        Affine::new(CoordFrame::FslScaledVoxel, CoordFrame::MriVoxel, matrix)
    }
}

/// Voxel indices of every nonzero voxel, in storage order, as a point cloud
/// in the voxel-index frame.
pub fn mask_to_point_cloud(mask: &MaskVolume) -> PointCloud {
    let [nx, ny, _] = mask.dims;
    let points = mask
        .data
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(idx, _)| {
            let i = idx % nx;
            let j = (idx / nx) % ny;
            let k = idx / (nx * ny);
            Point3::new(i as f64, j as f64, k as f64)
        })
        .collect();
    PointCloud::new(CoordFrame::MriVoxel, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn voxel_affine() -> Affine {
        Affine::from_parts(
            CoordFrame::MriVoxel,
            CoordFrame::Mri,
            &(Matrix3::identity() * 2.0),
            &Vector3::new(-10.0, -10.0, -10.0),
        )
    }

    #[test]
    fn test_mask_to_point_cloud_storage_order() {
        let mut data = vec![0.0; 3 * 2 * 2];
        // (2,0,0), (0,1,0), (1,1,1)
        data[2] = 1.0;
        data[3] = 1.0;
        data[1 + 3 * (1 + 2)] = 1.0;
        let mask = MaskVolume::new([3, 2, 2], data, voxel_affine()).unwrap();

        let cloud = mask_to_point_cloud(&mask);
        assert_eq!(cloud.frame(), CoordFrame::MriVoxel);
        assert_eq!(
            cloud.points(),
            &[
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 1.0)
            ]
        );

        let native = mask.voxel_to_mri().apply(&cloud);
        assert_eq!(native.points()[0], Point3::new(-6.0, -10.0, -10.0));
    }

    #[test]
    fn test_from_fn_and_value() {
        let mask = MaskVolume::from_fn([4, 4, 4], voxel_affine(), |i, j, k| i == j && j == k).unwrap();
        assert_eq!(mask.count_nonzero(), 4);
        assert_eq!(mask.value(2, 2, 2), Some(1.0));
        assert_eq!(mask.value(2, 1, 2), Some(0.0));
        assert_eq!(mask.value(4, 0, 0), None);
    }

    #[test]
    fn test_scaled_voxel_radiological() {
        let affine = Affine::from_parts(
            CoordFrame::MriVoxel,
            CoordFrame::Mri,
            &Matrix3::from_diagonal(&Vector3::new(-2.0, 2.0, 2.5)),
            &Vector3::new(90.0, -126.0, -72.0),
        );
        let mask = MaskVolume::from_fn([10, 10, 10], affine, |_, _, _| false).unwrap();
        let to_voxel = mask.scaled_voxel_to_voxel().unwrap();
        assert_eq!(to_voxel.from_frame(), CoordFrame::FslScaledVoxel);
        assert_eq!(to_voxel.to_frame(), CoordFrame::MriVoxel);
        let voxel = to_voxel.transform_point(&Point3::new(10.0, 10.0, 10.0));
        assert!((voxel - Point3::new(5.0, 5.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn test_scaled_voxel_neurological_flips_x() {
        // voxel_affine has a positive determinant
        let mask = MaskVolume::from_fn([8, 4, 4], voxel_affine(), |_, _, _| false).unwrap();
        let to_voxel = mask.scaled_voxel_to_voxel().unwrap();
        let voxel = to_voxel.transform_point(&Point3::new(2.0, 4.0, 6.0));
        assert!((voxel - Point3::new(6.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_new_validates() {
        assert!(MaskVolume::new([2, 2, 2], vec![0.0; 7], voxel_affine()).is_err());

        let wrong_frames = voxel_affine().with_frames(CoordFrame::Mni, CoordFrame::Mri);
        assert!(MaskVolume::new([1, 1, 1], vec![1.0], wrong_frames).is_err());
    }
}
