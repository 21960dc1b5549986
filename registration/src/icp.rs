//! Point-to-point ICP (Iterative Closest Point) registration.

use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;
use rhino_core::{Affine, Error, PointCloud, Result};

use crate::nearest::NearestNeighbors;
use crate::rigid::{rigid_transform_from_correspondences, MIN_CORRESPONDENCES};

pub const DEFAULT_MAX_ITERATIONS: usize = 30;
/// Minimum RMS improvement (mm) between iterations before stopping.
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// ICP registration result
///
/// # Fields
///
/// * `transform` - rigid transform mapping the moving cloud onto the fixed cloud
/// * `initial_error` - RMS nearest-point distance before the first iteration
/// * `error` - RMS nearest-point distance after the last iteration
/// * `error_history` - RMS error after each iteration
/// * `num_iterations` - iterations performed
/// * `converged` - whether the improvement tolerance was met before the cap
#[derive(Debug, Clone, PartialEq)]
pub struct IcpResult {
    pub transform: Affine,
    pub initial_error: f64,
    pub error: f64,
    pub error_history: Vec<f64>,
    pub num_iterations: usize,
    pub converged: bool,
}

/// Single-start ICP from the identity, with the default tolerance.
pub fn icp(fixed: &PointCloud, moving: &PointCloud, max_iterations: usize) -> Result<IcpResult> {
    let init = Affine::identity(moving.frame()).with_frames(moving.frame(), fixed.frame());
    icp_from(fixed, moving, &init, max_iterations, DEFAULT_TOLERANCE)
}

/// Single-start ICP from an initial moving -> fixed estimate.
///
/// # Algorithm
///
/// Per iteration:
/// 1. Transform the moving cloud by the current estimate
/// 2. Find each moving point's nearest fixed point
/// 3. Solve the rigid increment over those correspondences and compose it in
/// 4. Recompute the RMS nearest-point error; stop once it improves by less than `tolerance`
///
/// Reaching `max_iterations` is a normal termination; the estimate is still returned.
///
/// # Panics
///
/// Panics if `init` does not map the moving frame to the fixed frame.
pub fn icp_from(
    fixed: &PointCloud,
    moving: &PointCloud,
    init: &Affine,
    max_iterations: usize,
    tolerance: f64,
) -> Result<IcpResult> {
    assert!(
        init.from_frame() == moving.frame() && init.to_frame() == fixed.frame(),
        "ICP initial estimate must map {} -> {}, got {} -> {}",
        moving.frame(),
        fixed.frame(),
        init.from_frame(),
        init.to_frame()
    );
    check_cloud_sizes(fixed, moving)?;

    let index = NearestNeighbors::new(fixed.points());
    let run = run_icp(
        &index,
        fixed.points(),
        moving.points(),
        *init.matrix(),
        max_iterations,
        tolerance,
    )?;
    run.into_result(moving, fixed)
}

pub(crate) fn check_cloud_sizes(fixed: &PointCloud, moving: &PointCloud) -> Result<()> {
    for cloud in [fixed, moving] {
        if cloud.len() < MIN_CORRESPONDENCES {
            return Err(Error::insufficient(MIN_CORRESPONDENCES, cloud.len()));
        }
    }
    Ok(())
}

/// Frame-free ICP state shared by single- and multi-start registration.
#[derive(Debug, Clone)]
pub(crate) struct IcpRun {
    pub transformation: Matrix4<f64>,
    pub initial_error: f64,
    pub error: f64,
    pub error_history: Vec<f64>,
    pub converged: bool,
}

impl IcpRun {
    pub(crate) fn into_result(self, moving: &PointCloud, fixed: &PointCloud) -> Result<IcpResult> {
        Ok(IcpResult {
            transform: Affine::new(moving.frame(), fixed.frame(), self.transformation)?,
            initial_error: self.initial_error,
            error: self.error,
            num_iterations: self.error_history.len(),
            error_history: self.error_history,
            converged: self.converged,
        })
    }
}

struct Correspondences {
    moved: Vec<Point3<f64>>,
    matched: Vec<Point3<f64>>,
    rms: f64,
}

fn find_correspondences(
    index: &NearestNeighbors,
    fixed: &[Point3<f64>],
    moving: &[Point3<f64>],
    transformation: &Matrix4<f64>,
) -> Result<Correspondences> {
    let pairs: Vec<(Point3<f64>, usize, f64)> = moving
        .par_iter()
        .map(|p| {
            let moved = transformation.transform_point(p);
            index.nearest(&moved).map(|(idx, d2)| (moved, idx, d2))
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::insufficient(MIN_CORRESPONDENCES, index.len()))?;

    let mut sum_sq = 0.0;
    let mut moved = Vec::with_capacity(pairs.len());
    let mut matched = Vec::with_capacity(pairs.len());
    for (p, idx, d2) in pairs {
        sum_sq += d2;
        moved.push(p);
        matched.push(fixed[idx]);
    }

    Ok(Correspondences {
        moved,
        matched,
        rms: (sum_sq / moving.len() as f64).sqrt(),
    })
}

pub(crate) fn run_icp(
    index: &NearestNeighbors,
    fixed: &[Point3<f64>],
    moving: &[Point3<f64>],
    init: Matrix4<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> Result<IcpRun> {
    let mut transformation = init;
    let mut current = find_correspondences(index, fixed, moving, &transformation)?;
    let initial_error = current.rms;
    let mut error_history = Vec::with_capacity(max_iterations);
    let mut converged = false;

    for iter in 0..max_iterations {
        let increment = rigid_transform_from_correspondences(&current.moved, &current.matched)?;
        transformation = increment * transformation;

        let previous = current.rms;
        current = find_correspondences(index, fixed, moving, &transformation)?;
        error_history.push(current.rms);

        tracing::trace!(iteration = iter + 1, rms = current.rms, "icp iteration");

        if (previous - current.rms).abs() < tolerance {
            converged = true;
            break;
        }
    }

    Ok(IcpRun {
        transformation,
        initial_error,
        error: current.rms,
        error_history,
        converged,
    })
}
