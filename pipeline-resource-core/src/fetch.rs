//! Concurrent fan-out/fan-in of pipeline config fetches.
//!
//! [`fetch_all`] runs one fetch per pipeline, places every result into the
//! slot matching the pipeline's position in the input, waits for all of them
//! and only then decides between "every slot holds content" and "the run
//! failed". Consumers never see a partially successful result.
//!
//! There is no cancellation: a failing fetch does not stop its siblings, and
//! a fetch that never returns blocks the whole call. Timeouts belong to the
//! [`crate::contract::RemoteService`] implementation.

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

use crate::error::{BoxError, Error, Result};
use crate::model::{FetchOutcome, PipelineRef};

/// Tuning for [`fetch_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum number of fetches in flight at once. `None` starts every fetch immediately.
    pub max_in_flight: Option<NonZeroUsize>,
}

impl FetchOptions {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A limit of zero is treated as unbounded.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            max_in_flight: NonZeroUsize::new(limit),
        }
    }

    fn effective_limit(&self, total: usize) -> usize {
        match self.max_in_flight {
            Some(limit) => limit.get().min(total),
            None => total,
        }
    }
}

/// Fetch the config of every pipeline in `pipelines` concurrently.
///
/// On success the outcomes are returned in input order (`outcomes[i].index == i`),
/// regardless of the order in which fetches completed. If any fetch failed, all
/// failures are logged and the one at the lowest input index is returned as
/// [`Error::Fetch`].
pub async fn fetch_all<F, Fut>(
    pipelines: &[PipelineRef],
    options: &FetchOptions,
    fetch_one: F,
) -> Result<Vec<FetchOutcome>>
where
    F: Fn(PipelineRef) -> Fut,
    Fut: Future<Output = std::result::Result<String, BoxError>>,
{
    let total = pipelines.len();
    if total == 0 {
        debug!("No pipelines to fetch");
        return Ok(Vec::new());
    }

    let limit = options.effective_limit(total);
    info!(total, limit, "Fetching pipeline configs");

    let fetch_one = &fetch_one;
    let mut completed = stream::iter(pipelines.iter().cloned().enumerate())
        .map(move |(index, pipeline)| async move {
            debug!(index, pipeline = %pipeline.name, "Fetching pipeline config");
            (index, fetch_one(pipeline).await)
        })
        .buffer_unordered(limit);

    // Each fetch owns exactly one slot.
    let mut slots: Vec<Option<std::result::Result<String, BoxError>>> =
        (0..total).map(|_| None).collect();
    while let Some((index, result)) = completed.next().await {
        debug!(index, ok = result.is_ok(), "Pipeline fetch completed");
        slots[index] = Some(result);
    }
    debug!(total, "All pipeline fetches completed");

    let mut outcomes = Vec::with_capacity(total);
    let mut first_failure: Option<(usize, BoxError)> = None;
    let mut failed = 0;

    for (index, slot) in slots.into_iter().enumerate() {
        let pipeline = &pipelines[index];
        match slot.unwrap_or_else(|| Err(BoxError::from("fetch produced no result"))) {
            Ok(content) => outcomes.push(FetchOutcome {
                index,
                pipeline: pipeline.clone(),
                content,
            }),
            Err(e) => {
                failed += 1;
                warn!(index, pipeline = %pipeline.name, error = %e, "Pipeline fetch failed");
                if first_failure.is_none() {
                    first_failure = Some((index, e));
                }
            }
        }
    }

    match first_failure {
        Some((index, source)) => Err(Error::Fetch {
            pipeline: pipelines[index].name.clone(),
            failed,
            total,
            source,
        }),
        None => {
            info!(total, "Fetched all pipeline configs");
            Ok(outcomes)
        }
    }
}
