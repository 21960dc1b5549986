//! Worker pool for multi-start ICP.
//!
//! ICP starts run on rayon's global pool. It can be sized once per process,
//! from an explicit count or from `RHINO_CPU_THREADS`; otherwise rayon picks
//! one thread per core the first time a start runs.

use std::env;
use std::sync::OnceLock;

use rayon::ThreadPoolBuilder;

use crate::{Error, Result};

/// Environment variable consulted when no explicit thread count is given.
pub const CPU_THREADS_ENV: &str = "RHINO_CPU_THREADS";

static ICP_POOL: OnceLock<std::result::Result<usize, String>> = OnceLock::new();

/// Size the global pool that runs ICP starts and return its thread count.
///
/// `num_threads` takes priority over `RHINO_CPU_THREADS`; with neither, rayon
/// chooses. Only the first call builds the pool, later calls return its
/// outcome unchanged whatever they ask for.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<usize> {
    ICP_POOL
        .get_or_init(|| {
            let threads = match num_threads {
                Some(0) => return Err("cpu thread count must be >= 1".to_string()),
                Some(n) => Some(n),
                None => cpu_threads_from_env()?,
            };

            let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("rhino-icp-{i}"));
            if let Some(n) = threads {
                builder = builder.num_threads(n);
            }
            builder.build_global().map_err(|e| e.to_string())?;

            let size = rayon::current_num_threads();
            tracing::debug!(threads = size, "ICP worker pool ready");
            Ok(size)
        })
        .clone()
        .map_err(Error::Config)
}

pub fn current_cpu_threads() -> usize {
    rayon::current_num_threads()
}

/// Thread count from `RHINO_CPU_THREADS`, `None` when unset.
pub fn cpu_threads_from_env() -> std::result::Result<Option<usize>, String> {
    match env::var(CPU_THREADS_ENV) {
        Ok(raw) => parse_cpu_threads(&raw).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("failed to read {CPU_THREADS_ENV}: {e}")),
    }
}

fn parse_cpu_threads(raw: &str) -> std::result::Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(format!("{CPU_THREADS_ENV} must be >= 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(format!(
            "{CPU_THREADS_ENV} must be a positive integer, got '{raw}'"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_threads() {
        assert_eq!(parse_cpu_threads("4"), Ok(4));
        assert_eq!(parse_cpu_threads(" 12\n"), Ok(12));
    }

    #[test]
    fn test_parse_cpu_threads_rejects_bad_values() {
        for raw in ["0", "", "-2", "four", "1.5"] {
            let err = parse_cpu_threads(raw).unwrap_err();
            assert!(err.contains(CPU_THREADS_ENV), "{raw}: {err}");
        }
    }
}
