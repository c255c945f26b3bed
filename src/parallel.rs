//! Fork-join helper for the day-parallel stages: every unit of work is
//! pure and independent, results are merged afterwards, and a failure in
//! any unit aborts the batch instead of being silently absorbed.

use rayon::prelude::*;

use crate::errors::PipelineError;

pub fn try_par_map<T, R, F>(items: &[T], f: F) -> Result<Vec<R>, PipelineError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, PipelineError> + Sync + Send,
{
    items.par_iter().map(f).collect()
}
