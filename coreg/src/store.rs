//! Where a subject's inputs come from and where its outputs go.

use std::path::{Path, PathBuf};

use nalgebra::Point3;
use rhino_core::{
    Affine, CoordFrame, Error, FiducialKind, Fiducials, MaskVolume, PointCloud, Result,
    TriangleMesh,
};
use rhino_io::{
    read_nifti_mask, read_point_file, read_points_file, read_transform_file, read_vtk_file,
    write_point_file, write_surface_file, write_transform_file,
};
use tracing::{debug, info};

use crate::config::CoregConfig;
use crate::paths::SubjectPaths;
use crate::pipeline::CoregResult;

/// Digitized fiducials and headshape points, in head space.
#[derive(Debug, Clone, PartialEq)]
pub struct Polhemus {
    pub fiducials: Fiducials,
    pub headshape: PointCloud,
}

/// Collaborator contract for one subject's coregistration data.
pub trait SubjectStore {
    fn subject(&self) -> &str;

    fn load_polhemus(&self) -> Result<Polhemus>;

    /// Scalp mask in voxel space, with or without the nose.
    fn load_scalp_mask(&self, with_nose: bool) -> Result<MaskVolume>;

    /// Standard MNI space to native structural space.
    fn load_mni_to_native(&self) -> Result<Affine>;

    fn publish(&self, result: &CoregResult) -> Result<()>;
}

/// [`SubjectStore`] over the on-disk subject layout.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: SubjectPaths,
    staged: bool,
}

enum Output {
    Transform(Affine),
    Point(Point3<f64>),
    Surface(TriangleMesh),
}

impl Output {
    fn write(&self, path: &Path) -> Result<()> {
        match self {
            Output::Transform(t) => write_transform_file(path, t),
            Output::Point(p) => write_point_file(path, p),
            Output::Surface(mesh) => write_surface_file(path, mesh),
        }
    }
}

/// Bring an extracted surface mesh into native MRI mm.
///
/// `mesh` is in FSL scaled-voxel mm of `mesh_mask`'s grid; the voxel indices
/// are then mapped with the structural `voxel_to_mri`.
pub fn surface_to_native(
    mesh: &TriangleMesh,
    mesh_mask: &MaskVolume,
    voxel_to_mri: &Affine,
) -> Result<TriangleMesh> {
    let to_voxel = mesh_mask.scaled_voxel_to_voxel()?;
    Ok(mesh.transformed(&to_voxel.then(voxel_to_mri)))
}

impl FileStore {
    pub fn new(paths: SubjectPaths) -> Self {
        Self {
            paths,
            staged: true,
        }
    }

    pub fn from_config(paths: SubjectPaths, config: &CoregConfig) -> Self {
        Self::new(paths).with_staged_publish(config.staged_publish)
    }

    /// Choose between staged publishing and writing outputs in place one by one.
    pub fn with_staged_publish(mut self, staged: bool) -> Self {
        self.staged = staged;
        self
    }

    pub fn paths(&self) -> &SubjectPaths {
        &self.paths
    }

    /// Every output file paired with its contents. Surfaces are read and
    /// transformed here, so a missing mesh fails before anything is written.
    fn outputs(&self, result: &CoregResult) -> Result<Vec<(PathBuf, Output)>> {
        let coreg = &self.paths.coreg;
        let mut outputs = vec![
            (coreg.head_mri_t.clone(), Output::Transform(result.head_to_mri)),
            (
                coreg.mrivoxel_mri_t.clone(),
                Output::Transform(result.voxel_to_mri),
            ),
        ];
        for kind in FiducialKind::ALL {
            outputs.push((
                coreg.smri_fiducial(kind).to_path_buf(),
                Output::Point(result.smri_fiducials.get(kind)),
            ));
        }
        for surface in self.paths.surfaces.surfaces() {
            let mesh = read_vtk_file(&surface.vtk_mesh, CoordFrame::FslScaledVoxel)?;
            let mask = read_nifti_mask(&surface.mask)?;
            outputs.push((
                surface.surf.clone(),
                Output::Surface(surface_to_native(&mesh, &mask, &result.voxel_to_mri)?),
            ));
        }
        Ok(outputs)
    }

    fn publish_staged(&self, outputs: &[(PathBuf, Output)]) -> Result<()> {
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.paths.coreg.dir)?;

        let mut staged = Vec::with_capacity(outputs.len());
        for (i, (dest, output)) in outputs.iter().enumerate() {
            let file_name = dest
                .file_name()
                .ok_or_else(|| Error::InvalidInput(format!("bad output path {}", dest.display())))?;
            // Prefixed so that equal file names in different directories cannot collide.
            let tmp = staging
                .path()
                .join(format!("{i:02}-{}", file_name.to_string_lossy()));
            output.write(&tmp)?;
            staged.push((tmp, dest));
        }

        for (tmp, dest) in staged {
            std::fs::rename(&tmp, dest)?;
            debug!(path = %dest.display(), "published");
        }
        staging.close()?;
        Ok(())
    }
}

impl SubjectStore for FileStore {
    fn subject(&self) -> &str {
        &self.paths.subject
    }

    fn load_polhemus(&self) -> Result<Polhemus> {
        let coreg = &self.paths.coreg;
        let nasion = read_point_file(coreg.polhemus_fiducial(FiducialKind::Nasion))?;
        let rpa = read_point_file(coreg.polhemus_fiducial(FiducialKind::Rpa))?;
        let lpa = read_point_file(coreg.polhemus_fiducial(FiducialKind::Lpa))?;
        let headshape = read_points_file(&coreg.polhemus_headshape, CoordFrame::Head)?;
        info!(headshape_points = headshape.len(), "loaded polhemus points");
        Ok(Polhemus {
            fiducials: Fiducials::new(CoordFrame::Head, nasion, rpa, lpa),
            headshape,
        })
    }

    fn load_scalp_mask(&self, with_nose: bool) -> Result<MaskVolume> {
        let path = self.paths.surfaces.scalp_mask(with_nose);
        let mask = read_nifti_mask(path)?;
        info!(
            path = %path.display(),
            dims = ?mask.dims(),
            voxels = mask.count_nonzero(),
            "loaded scalp mask"
        );
        Ok(mask)
    }

    fn load_mni_to_native(&self) -> Result<Affine> {
        let transform = read_transform_file(
            &self.paths.surfaces.mni_mri_t,
            Some((CoordFrame::Mni, CoordFrame::Mri)),
        )?;
        if transform.from_frame() != CoordFrame::Mni || transform.to_frame() != CoordFrame::Mri {
            return Err(Error::InvalidInput(format!(
                "{} holds a {} -> {} transform, expected {} -> {}",
                self.paths.surfaces.mni_mri_t.display(),
                transform.from_frame(),
                transform.to_frame(),
                CoordFrame::Mni,
                CoordFrame::Mri
            )));
        }
        Ok(transform)
    }

    fn publish(&self, result: &CoregResult) -> Result<()> {
        self.paths.create_dirs()?;
        let outputs = self.outputs(result)?;
        if self.staged {
            self.publish_staged(&outputs)?;
        } else {
            for (dest, output) in &outputs {
                output.write(dest)?;
            }
        }
        info!(
            files = outputs.len(),
            dir = %self.paths.coreg.dir.display(),
            "published coregistration"
        );
        Ok(())
    }
}
