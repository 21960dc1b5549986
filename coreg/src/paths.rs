//! Per-subject file layout.
//!
//! Everything a coregistration run reads or writes lives under
//! `<subjects_dir>/<subject>/rhino/`. Resolution is pure; directories are only
//! created by [`SubjectPaths::create_dirs`].

use std::path::{Path, PathBuf};

use rhino_core::{FiducialKind, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoregPaths {
    pub dir: PathBuf,
    pub head_mri_t: PathBuf,
    pub mrivoxel_mri_t: PathBuf,
    pub smri_nasion: PathBuf,
    pub smri_rpa: PathBuf,
    pub smri_lpa: PathBuf,
    pub polhemus_nasion: PathBuf,
    pub polhemus_rpa: PathBuf,
    pub polhemus_lpa: PathBuf,
    pub polhemus_headshape: PathBuf,
}

impl CoregPaths {
    fn new(dir: PathBuf) -> Self {
        Self {
            head_mri_t: dir.join("head_mri-trans.txt"),
            mrivoxel_mri_t: dir.join("mrivoxel_mri-trans.txt"),
            smri_nasion: dir.join("smri_nasion.txt"),
            smri_rpa: dir.join("smri_rpa.txt"),
            smri_lpa: dir.join("smri_lpa.txt"),
            polhemus_nasion: dir.join("polhemus_nasion.txt"),
            polhemus_rpa: dir.join("polhemus_rpa.txt"),
            polhemus_lpa: dir.join("polhemus_lpa.txt"),
            polhemus_headshape: dir.join("polhemus_headshape.txt"),
            dir,
        }
    }

    /// Structural fiducial output file
    pub fn smri_fiducial(&self, kind: FiducialKind) -> &Path {
        match kind {
            FiducialKind::Nasion => &self.smri_nasion,
            FiducialKind::Rpa => &self.smri_rpa,
            FiducialKind::Lpa => &self.smri_lpa,
        }
    }

    /// Digitized fiducial input file
    pub fn polhemus_fiducial(&self, kind: FiducialKind) -> &Path {
        match kind {
            FiducialKind::Nasion => &self.polhemus_nasion,
            FiducialKind::Rpa => &self.polhemus_rpa,
            FiducialKind::Lpa => &self.polhemus_lpa,
        }
    }
}

/// One structural surface: the extraction mask, the mesh extracted from it
/// (FSL scaled-voxel mm) and the native-space surface regenerated from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceFiles {
    pub name: &'static str,
    pub mask: PathBuf,
    pub vtk_mesh: PathBuf,
    pub surf: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacePaths {
    pub dir: PathBuf,
    pub mni_mri_t: PathBuf,
    pub outskin_mesh: PathBuf,
    pub outskin_plus_nose_mesh: PathBuf,
    pub inskull: SurfaceFiles,
    pub outskull: SurfaceFiles,
    pub outskin: SurfaceFiles,
}

impl SurfacePaths {
    fn new(dir: PathBuf) -> Self {
        let surface = |name: &'static str| SurfaceFiles {
            name,
            mask: dir.join(format!("{name}_mesh.nii.gz")),
            vtk_mesh: dir.join(format!("{name}_mesh.vtk")),
            surf: dir.join(format!("{name}.surf")),
        };
        Self {
            mni_mri_t: dir.join("mni_mri-trans.txt"),
            outskin_mesh: dir.join("outskin_mesh.nii.gz"),
            outskin_plus_nose_mesh: dir.join("outskin_plus_nose_mesh.nii.gz"),
            inskull: surface("inskull"),
            outskull: surface("outskull"),
            outskin: surface("outskin"),
            dir,
        }
    }

    pub fn scalp_mask(&self, with_nose: bool) -> &Path {
        if with_nose {
            &self.outskin_plus_nose_mesh
        } else {
            &self.outskin_mesh
        }
    }

    /// Inner skull, outer skull and scalp, in that order.
    pub fn surfaces(&self) -> [&SurfaceFiles; 3] {
        [&self.inskull, &self.outskull, &self.outskin]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPaths {
    pub subject: String,
    pub coreg: CoregPaths,
    pub surfaces: SurfacePaths,
}

impl SubjectPaths {
    pub fn resolve(subjects_dir: impl AsRef<Path>, subject: &str) -> Self {
        let rhino_dir = subjects_dir.as_ref().join(subject).join("rhino");
        Self {
            subject: subject.to_string(),
            coreg: CoregPaths::new(rhino_dir.join("coreg")),
            surfaces: SurfacePaths::new(rhino_dir.join("surfaces")),
        }
    }

    pub fn create_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.coreg.dir)?;
        std::fs::create_dir_all(&self.surfaces.dir)?;
        Ok(())
    }
}
