//! Multi-start ICP.
//!
//! ICP only finds a local optimum, so registration is repeated from several
//! randomly perturbed copies of the initial estimate and the lowest-error run
//! is kept. Perturbations are drawn up front from one seeded generator, runs
//! execute in parallel, and the winner is picked afterwards in start order:
//! a strictly lower error wins and ties keep the earlier start. The result is
//! therefore identical for a given seed regardless of thread scheduling.

use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rhino_core::{Affine, Error, PointCloud, Result};
use serde::{Deserialize, Serialize};

use crate::icp::{check_cloud_sizes, run_icp, IcpResult, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
use crate::nearest::NearestNeighbors;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpOptions {
    /// Iteration cap for each start
    pub max_iterations: usize,
    /// Minimum RMS improvement (mm) between iterations
    pub tolerance: f64,
    /// Number of starts, including the unperturbed one
    pub n_init: usize,
    /// Half-range of the uniform rotation jitter about each axis, degrees
    pub rotation_jitter_deg: f64,
    /// Half-range of the uniform translation jitter along each axis, mm
    pub translation_jitter_mm: f64,
    pub seed: u64,
}

/// Largest accepted rotation jitter half-range, degrees.
pub const MAX_ROTATION_JITTER_DEG: f64 = 180.0;
/// Largest accepted translation jitter half-range, mm. A head fits well inside.
pub const MAX_TRANSLATION_JITTER_MM: f64 = 1000.0;

impl IcpOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(Error::Config(format!(
                "icp.tolerance must be finite and >= 0, got {}",
                self.tolerance
            )));
        }
        check_jitter(
            "icp.rotation_jitter_deg",
            self.rotation_jitter_deg,
            MAX_ROTATION_JITTER_DEG,
        )?;
        check_jitter(
            "icp.translation_jitter_mm",
            self.translation_jitter_mm,
            MAX_TRANSLATION_JITTER_MM,
        )
    }
}

fn check_jitter(name: &str, value: f64, max: f64) -> Result<()> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} must be in [0, {}], got {}",
            name, max, value
        )))
    }
}

impl Default for IcpOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            n_init: 30,
            rotation_jitter_deg: 15.0,
            translation_jitter_mm: 5.0,
            seed: 0x5248_494e_4f,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiStartResult {
    /// Lowest-error run
    pub best: IcpResult,
    /// Index of the winning start; 0 is the unperturbed estimate
    pub best_start: usize,
    /// Final RMS error of every start, in start order
    pub start_errors: Vec<f64>,
}

/// Run ICP from `init` and from `options.n_init - 1` random perturbations of it.
///
/// Each perturbation rotates about the centroid of the moving cloud (as placed
/// by `init`) and then translates.
pub fn icp_multistart(
    fixed: &PointCloud,
    moving: &PointCloud,
    init: &Affine,
    options: &IcpOptions,
) -> Result<MultiStartResult> {
    assert!(
        init.from_frame() == moving.frame() && init.to_frame() == fixed.frame(),
        "ICP initial estimate must map {} -> {}, got {} -> {}",
        moving.frame(),
        fixed.frame(),
        init.from_frame(),
        init.to_frame()
    );
    options.validate()?;
    check_cloud_sizes(fixed, moving)?;

    let pivot = init.apply(moving).centroid().unwrap_or_else(Point3::origin);
    let starts = perturbed_starts(init.matrix(), &pivot, options)?;

    let index = NearestNeighbors::new(fixed.points());
    let mut runs = starts
        .par_iter()
        .map(|start| {
            run_icp(
                &index,
                fixed.points(),
                moving.points(),
                *start,
                options.max_iterations,
                options.tolerance,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut best_start = 0;
    tracing::debug!(start = 0, error = runs[0].error, "icp start");
    for (i, run) in runs.iter().enumerate().skip(1) {
        tracing::debug!(start = i, error = run.error, "icp start");
        if run.error < runs[best_start].error {
            tracing::info!(start = i, error = run.error, "ICP found better xform");
            best_start = i;
        }
    }

    let start_errors = runs.iter().map(|r| r.error).collect();
    let best = runs.swap_remove(best_start).into_result(moving, fixed)?;

    Ok(MultiStartResult {
        best,
        best_start,
        start_errors,
    })
}

/// Start matrices: the unperturbed estimate first, then seeded perturbations.
fn perturbed_starts(
    init: &Matrix4<f64>,
    pivot: &Point3<f64>,
    options: &IcpOptions,
) -> Result<Vec<Matrix4<f64>>> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let n = options.n_init.max(1);
    let rot = options.rotation_jitter_deg.to_radians();
    let shift = options.translation_jitter_mm;

    let mut starts = Vec::with_capacity(n);
    starts.push(*init);
    for _ in 1..n {
        let rotation = Rotation3::from_euler_angles(
            uniform(&mut rng, rot)?,
            uniform(&mut rng, rot)?,
            uniform(&mut rng, rot)?,
        );
        let offset = Vector3::new(
            uniform(&mut rng, shift)?,
            uniform(&mut rng, shift)?,
            uniform(&mut rng, shift)?,
        );

        let mut perturbation = Matrix4::identity();
        perturbation
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(rotation.matrix());
        let translation = pivot.coords + offset - rotation * pivot.coords;
        perturbation
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&translation);

        starts.push(perturbation * init);
    }
    Ok(starts)
}

/// Draw from `[-half_range, half_range]`; the span must be finite.
fn uniform(rng: &mut StdRng, half_range: f64) -> Result<f64> {
    if !(2.0 * half_range).is_finite() {
        return Err(Error::Config(format!(
            "jitter half-range {} is not finite",
            half_range
        )));
    }
    if half_range > 0.0 {
        Ok(rng.gen_range(-half_range..=half_range))
    } else {
        Ok(0.0)
    }
}
