//! Coregistration settings, resolved once and passed into the pipeline.

use std::path::Path;

use rhino_core::{Error, Result};
use rhino_registration::IcpOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoregConfig {
    /// Refine the fiducial fit with ICP over the headshape points
    pub use_headshape: bool,
    /// Use the scalp mask that includes the nose
    pub use_nose: bool,
    pub icp: IcpOptions,
    /// Write outputs to a staging directory and move them into place together
    pub staged_publish: bool,
    /// Fiducial triangles below this shape quality are logged as ill-conditioned
    pub min_fiducial_quality: f64,
    /// ICP worker threads; `None` defers to `RHINO_CPU_THREADS`, then rayon
    pub cpu_threads: Option<usize>,
}

impl Default for CoregConfig {
    fn default() -> Self {
        Self {
            use_headshape: true,
            use_nose: true,
            icp: IcpOptions::default(),
            staged_publish: true,
            min_fiducial_quality: 0.05,
            cpu_threads: None,
        }
    }
}

impl CoregConfig {
    /// Load a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::missing_input(path))
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.icp.n_init == 0 {
            return Err(Error::Config("icp.n_init must be >= 1".to_string()));
        }
        self.icp.validate()?;
        if self.cpu_threads == Some(0) {
            return Err(Error::Config("cpu_threads must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_fiducial_quality) {
            return Err(Error::Config(format!(
                "min_fiducial_quality must be in [0, 1], got {}",
                self.min_fiducial_quality
            )));
        }
        Ok(())
    }

    /// Size the ICP worker pool from this config. Only the first call in a
    /// process takes effect; the returned count is the pool actually in use.
    pub fn init_thread_pool(&self) -> Result<usize> {
        rhino_core::init_global_thread_pool(self.cpu_threads)
    }
}
