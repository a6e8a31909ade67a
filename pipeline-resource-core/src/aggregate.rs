//! Turns a complete, ordered set of fetch outcomes into either files or a fingerprint.
//!
//! Both functions expect the output of a successful [`crate::fetch::fetch_all`]
//! and do no error checking of their own.

use crate::model::{FetchOutcome, PipelineFile};

/// Extension used for files written by the `in` direction.
pub const PIPELINE_FILE_EXTENSION: &str = "yml";

/// One file per outcome, in outcome order, named `<pipeline>.<extension>`.
///
/// Outcomes sharing a pipeline name produce entries with the same filename;
/// nothing is merged or dropped here.
pub fn to_files(outcomes: &[FetchOutcome], extension: &str) -> Vec<PipelineFile> {
    outcomes
        .iter()
        .map(|outcome| PipelineFile {
            filename: format!("{}.{}", outcome.pipeline.name, extension),
            contents: outcome.content.as_bytes().to_vec(),
        })
        .collect()
}

/// Lowercase hex MD5 of every outcome's content concatenated in order, without separators.
///
/// The value depends on what the fetcher returned as content, so two fetchers that
/// render the same config differently produce different checksums.
pub fn fingerprint(outcomes: &[FetchOutcome]) -> String {
    let mut ctx = md5::Context::new();
    for outcome in outcomes {
        ctx.consume(outcome.content.as_bytes());
    }
    format!("{:x}", ctx.compute())
}
