//! The coregistration pipeline for one subject.
//!
//! Stages run strictly in order:
//!
//! 1. load the digitized points, the scalp mask and the MNI-to-native transform
//! 2. map the standard MNI fiducials into native MRI space
//! 3. fit native -> head from the two fiducial triplets
//! 4. project the scalp mask into head space through that fit
//! 5. optionally refine the fit with multi-start ICP over the headshape
//! 6. publish the transforms, fiducials and regenerated surfaces
//!
//! Any failure aborts the run and is reported with the subject and stage.

use std::fmt;

use rhino_core::{
    mask_to_point_cloud, Affine, CoordFrame, Error, Fiducials, MaskVolume, PointCloud, Result,
};
use rhino_registration::{align_fiducials, icp_multistart, MultiStartResult};
use tracing::{info, info_span, warn};

use crate::config::CoregConfig;
use crate::store::{Polhemus, SubjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    StandardizeFiducials,
    InitialFit,
    ProjectHeadshape,
    IcpRefinement,
    Persist,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::StandardizeFiducials => "standardize fiducials",
            Stage::InitialFit => "initial fit",
            Stage::ProjectHeadshape => "project headshape",
            Stage::IcpRefinement => "ICP refinement",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed run: which subject, which stage, and the underlying error.
#[derive(Debug, thiserror::Error)]
#[error("coregistration of subject '{subject}' failed during {stage}: {source}")]
pub struct CoregError {
    pub subject: String,
    pub stage: Stage,
    pub source: Error,
}

trait AtStage<T> {
    fn at(self, subject: &str, stage: Stage) -> std::result::Result<T, CoregError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, subject: &str, stage: Stage) -> std::result::Result<T, CoregError> {
        self.map_err(|source| CoregError {
            subject: subject.to_string(),
            stage,
            source,
        })
    }
}

/// Everything the computation needs, already loaded.
#[derive(Debug, Clone)]
pub struct CoregInputs {
    pub polhemus: Polhemus,
    pub scalp_mask: MaskVolume,
    /// Standard MNI space to native structural space
    pub mni_to_native: Affine,
}

/// Outcome of a run, as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct CoregResult {
    /// Head (polhemus) space to native MRI space; the final answer
    pub head_to_mri: Affine,
    /// Voxel index to native MRI space of the scalp mask
    pub voxel_to_mri: Affine,
    /// Native MRI to head from the fiducials alone
    pub initial_native_to_head: Affine,
    /// Native MRI to head after ICP; equal to the initial fit without ICP
    pub native_to_head: Affine,
    /// Standard fiducials mapped to native space and then into head space
    pub smri_fiducials: Fiducials,
    pub polhemus_fiducials: Fiducials,
    /// Scalp points in head space under the refined fit
    pub smri_headshape: PointCloud,
    pub icp: Option<MultiStartResult>,
}

impl CoregResult {
    /// MEG device to native MRI, given the device-to-head transform in metres.
    ///
    /// # Panics
    ///
    /// Panics if `device_to_head` does not end in head space.
    pub fn device_to_mri(&self, device_to_head: &Affine) -> Affine {
        device_to_head.meters_to_millimeters().then(&self.head_to_mri)
    }
}

/// Load, compute and publish for the subject behind `store`.
pub fn coregister<S: SubjectStore + ?Sized>(
    store: &S,
    config: &CoregConfig,
) -> std::result::Result<CoregResult, CoregError> {
    let subject = store.subject().to_string();
    let span = info_span!("coreg", subject = %subject);
    let _guard = span.enter();

    let inputs = load_inputs(store, config).at(&subject, Stage::Load)?;
    let result = compute(&subject, &inputs, config)?;

    info!(stage = %Stage::Persist, "publishing coregistration outputs");
    store.publish(&result).at(&subject, Stage::Persist)?;
    info!("coregistration complete");
    Ok(result)
}

fn load_inputs<S: SubjectStore + ?Sized>(store: &S, config: &CoregConfig) -> Result<CoregInputs> {
    info!(use_nose = config.use_nose, "loading inputs");
    Ok(CoregInputs {
        polhemus: store.load_polhemus()?,
        scalp_mask: store.load_scalp_mask(config.use_nose)?,
        mni_to_native: store.load_mni_to_native()?,
    })
}

/// Run stages 2 to 5 on loaded inputs without touching storage.
pub fn compute(
    subject: &str,
    inputs: &CoregInputs,
    config: &CoregConfig,
) -> std::result::Result<CoregResult, CoregError> {
    let polhemus_fiducials = inputs.polhemus.fiducials;
    let polhemus_headshape = &inputs.polhemus.headshape;
    check_head_frame(polhemus_fiducials.frame()).at(subject, Stage::Load)?;
    check_head_frame(polhemus_headshape.frame()).at(subject, Stage::Load)?;

    info!(stage = %Stage::StandardizeFiducials, "mapping MNI fiducials to native space");
    let smri_fiducials_native =
        standardize_fiducials(&inputs.mni_to_native).at(subject, Stage::StandardizeFiducials)?;

    info!(stage = %Stage::InitialFit, "fitting fiducials");
    for (label, fiducials) in [("polhemus", &polhemus_fiducials), ("smri", &smri_fiducials_native)] {
        let quality = fiducials.triangle_quality();
        if quality < config.min_fiducial_quality {
            warn!(
                fiducials = label,
                quality,
                threshold = config.min_fiducial_quality,
                "fiducials are close to collinear; the rigid fit is poorly conditioned"
            );
        }
    }
    let initial = align_fiducials(&smri_fiducials_native, &polhemus_fiducials)
        .at(subject, Stage::InitialFit)?;

    info!(stage = %Stage::ProjectHeadshape, "projecting scalp mask into head space");
    let voxel_to_mri = *inputs.scalp_mask.voxel_to_mri();
    let smri_headshape_native = voxel_to_mri.apply(&mask_to_point_cloud(&inputs.scalp_mask));
    if smri_headshape_native.is_empty() {
        return Err(CoregError {
            subject: subject.to_string(),
            stage: Stage::ProjectHeadshape,
            source: Error::InvalidInput("scalp mask has no nonzero voxels".to_string()),
        });
    }
    let smri_headshape_initial = initial.apply(&smri_headshape_native);

    let (native_to_head, icp) = if config.use_headshape {
        info!(
            stage = %Stage::IcpRefinement,
            fixed = smri_headshape_initial.len(),
            moving = polhemus_headshape.len() + 3,
            "running ICP"
        );
        let moving = polhemus_headshape.concat(&polhemus_fiducials.to_point_cloud());
        let multistart = icp_multistart(
            &smri_headshape_initial,
            &moving,
            &Affine::identity(CoordFrame::Head),
            &config.icp,
        )
        .at(subject, Stage::IcpRefinement)?;
        info!(
            initial_error = multistart.best.initial_error,
            error = multistart.best.error,
            best_start = multistart.best_start,
            "ICP finished"
        );

        // ICP moved the digitized points onto the projected scalp; undo that
        // motion on the scalp side instead.
        let refinement = multistart
            .best
            .transform
            .inverse()
            .at(subject, Stage::IcpRefinement)?;
        (initial.then(&refinement), Some(multistart))
    } else {
        info!("headshape disabled; using the fiducial fit");
        (initial.then(&Affine::identity(CoordFrame::Head)), None)
    };

    let head_to_mri = native_to_head.inverse().at(subject, Stage::IcpRefinement)?;

    Ok(CoregResult {
        head_to_mri,
        voxel_to_mri,
        initial_native_to_head: initial,
        native_to_head,
        smri_fiducials: smri_fiducials_native.transformed(&native_to_head),
        polhemus_fiducials,
        smri_headshape: native_to_head.apply(&smri_headshape_native),
        icp,
    })
}

/// Standard MNI fiducials expressed in native MRI space.
pub fn standardize_fiducials(mni_to_native: &Affine) -> Result<Fiducials> {
    if mni_to_native.from_frame() != CoordFrame::Mni || mni_to_native.to_frame() != CoordFrame::Mri {
        return Err(Error::InvalidInput(format!(
            "expected an {} -> {} transform, got {} -> {}",
            CoordFrame::Mni,
            CoordFrame::Mri,
            mni_to_native.from_frame(),
            mni_to_native.to_frame()
        )));
    }
    Ok(Fiducials::standard_mni().transformed(mni_to_native))
}

fn check_head_frame(frame: CoordFrame) -> Result<()> {
    if frame != CoordFrame::Head {
        return Err(Error::InvalidInput(format!(
            "digitized points must be in {} space, got {}",
            CoordFrame::Head,
            frame
        )));
    }
    Ok(())
}
