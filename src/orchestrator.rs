use std::fmt::Display;

use anyhow::Result;
use tracing::info;

use crate::config::FanoutOptions;
use crate::error::FanoutError;
use crate::fanout::fan_out;

/// Produces the ordered identifiers to fetch. Consulted once per call.
pub trait ItemSource {
    type Id;

    fn list(&self) -> Result<Vec<Self::Id>>;
}

/// Fetches a single item. Called from many threads at once.
pub trait Fetcher<I>: Send + Sync {
    type Item;

    fn fetch(&self, id: &I) -> Result<Self::Item>;
}

impl<I, T, F> Fetcher<I> for F
where
    F: Fn(&I) -> Result<T> + Send + Sync,
{
    type Item = T;

    fn fetch(&self, id: &I) -> Result<T> {
        self(id)
    }
}

/// List identifiers from `source`, then fetch them all concurrently.
///
/// A listing failure aborts before any fetch is launched. `opts.limit` keeps only
/// the first `limit` identifiers; a limit beyond the listing length is clamped.
pub fn fetch_all<S, F>(
    source: &S,
    fetcher: &F,
    opts: &FanoutOptions,
) -> Result<Vec<F::Item>, FanoutError>
where
    S: ItemSource + ?Sized,
    S::Id: Display + Sync,
    F: Fetcher<S::Id> + ?Sized,
    F::Item: Send,
{
    let mut ids = source.list().map_err(FanoutError::Listing)?;
    let listed = ids.len();
    if let Some(limit) = opts.limit {
        ids.truncate(limit);
    }
    info!(listed, selected = ids.len(), "fetching items");

    fetch_ids(&ids, fetcher, opts)
}

/// Fetch an explicit identifier list concurrently, preserving its order.
pub fn fetch_ids<I, F>(
    ids: &[I],
    fetcher: &F,
    opts: &FanoutOptions,
) -> Result<Vec<F::Item>, FanoutError>
where
    I: Display + Sync,
    F: Fetcher<I> + ?Sized,
    F::Item: Send,
{
    fan_out(ids, |id| fetcher.fetch(id), opts)
}
