pub use rhino_core as core;
pub use rhino_coreg as coreg;
pub use rhino_io as io;
pub use rhino_registration as registration;

/// Size the worker pool that runs multi-start ICP and return its thread count.
///
/// Call this once at startup, before the first coregistration run. An
/// explicit `num_threads` wins over `RHINO_CPU_THREADS`; with neither, rayon
/// picks. Later calls return the first outcome.
pub fn init_thread_pool(num_threads: Option<usize>) -> rhino_core::Result<usize> {
    rhino_core::init_global_thread_pool(num_threads)
}
