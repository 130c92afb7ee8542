pub mod aggregate;
pub mod shred;

pub use aggregate::{AggregateProgress, AggregateRequest, AggregateService};
pub use shred::{ShredProgress, ShredRequest, ShredService};

use anyhow::{Context, Result};

/// Run `work` over `items` on a dedicated pool of `jobs` threads, keeping
/// input order in the result. `jobs <= 1` runs inline.
pub(crate) fn run_parallel<T, R, F>(items: &[T], jobs: usize, work: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    use rayon::prelude::*;

    if jobs <= 1 || items.len() <= 1 {
        return Ok(items.iter().map(work).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("poolscope-worker-{}", i))
        .build()
        .context("Failed to start worker pool")?;
    Ok(pool.install(|| items.par_iter().map(work).collect()))
}
