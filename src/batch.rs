//! Decodes many independent replays concurrently on the tokio blocking pool.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ReplayError;
use crate::frames::FrameSource;
use crate::pipeline::{decode_replay, DecodeContext, ReplayAnalysis};
use crate::settings::DecoderSettings;

#[derive(Clone, Debug)]
pub struct ReplayJob {
    pub replay_name: String,
    pub sources: Vec<FrameSource>,
    pub context: DecodeContext,
}

impl ReplayJob {
    pub fn new(replay_name: impl Into<String>, sources: Vec<FrameSource>) -> Self {
        Self {
            replay_name: replay_name.into(),
            sources,
            context: DecodeContext::default(),
        }
    }

    pub fn with_context(mut self, context: DecodeContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug)]
pub struct ReplayOutcome {
    pub replay_name: String,
    pub result: Result<ReplayAnalysis, ReplayError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum BatchProgress {
    ReplayFinished { replay_name: String, succeeded: bool },
}

/// Outcomes come back in job order regardless of completion order.
pub async fn decode_replays(
    jobs: Vec<ReplayJob>,
    settings: DecoderSettings,
    progress: Option<mpsc::UnboundedSender<BatchProgress>>,
) -> Vec<ReplayOutcome> {
    let settings = Arc::new(settings);
    let job_count = jobs.len();

    let handles = jobs
        .into_iter()
        .map(|job| {
            let settings = Arc::clone(&settings);
            let progress = progress.clone();
            let replay_name = job.replay_name.clone();
            let handle: JoinHandle<Result<ReplayAnalysis, ReplayError>> =
                tokio::task::spawn_blocking(move || {
                    let result =
                        decode_replay(&job.replay_name, job.sources, &settings, &job.context);
                    if let Some(progress) = progress {
                        let _ = progress.send(BatchProgress::ReplayFinished {
                            replay_name: job.replay_name.clone(),
                            succeeded: result.is_ok(),
                        });
                    }
                    result
                });
            (replay_name, handle)
        })
        .collect::<Vec<_>>();

    let mut outcomes = Vec::with_capacity(job_count);
    for (replay_name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(error) => Err(ReplayError::Batch(format!(
                "Decoding task for '{replay_name}' failed: {error}"
            ))),
        };

        if let Err(error) = &result {
            tracing::warn!(
                replay = %replay_name,
                fatal = error.is_fatal_for_replay(),
                "Replay failed to decode: {error}"
            );
        }

        outcomes.push(ReplayOutcome {
            replay_name,
            result,
        });
    }

    tracing::info!(
        replays = job_count,
        succeeded = outcomes.iter().filter(|outcome| outcome.result.is_ok()).count(),
        "Finished replay batch"
    );

    outcomes
}
