//! Four-stage article generation
//!
//! # State Progression
//! PLANNING → DRAFTING → REVIEWING → FINALIZING → COMPLETE, or FAILED
//!
//! Each stage is a dedicated `phase_*` method and starts only after the
//! previous stage's output is fully materialized, since its prompt embeds that
//! output. Drafting and finalizing stream fragments to the progress sink as
//! they arrive. Reviewing and finalizing see the draft capped at
//! `review_cutoff_chars`.
//!
//! Any failure ends the run at that stage: one `error` event is emitted and the
//! outputs of earlier stages are dropped. Nothing is retried. When the progress
//! consumer goes away the run stops before its next provider call.

use futures::StreamExt;
use redactor_common::config::PipelineConfig;
use redactor_common::text::truncate_chars;
use redactor_common::{ProgressEvent, StageId};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{FailureReason, GeneratedArticle, GenerationRequest, PipelineRun, StageResult};
use crate::services::completion_client::{CompletionError, CompletionProvider};
use crate::services::progress_emitter::{EmitError, ProgressSink};

mod phase_drafting;
mod phase_finalizing;
mod phase_planning;
mod phase_reviewing;
pub mod prompts;

/// How a run ended when it did not complete
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage produced nothing usable
    #[error("{reason} ({detail})")]
    Failed {
        reason: FailureReason,
        detail: String,
    },

    /// The progress consumer went away; no further provider calls were made
    #[error("stopped during {stage}: {cause}")]
    Aborted { stage: StageId, cause: EmitError },

    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            PipelineError::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Terminal event reporting this error to a streaming client
    pub fn to_event(&self) -> ProgressEvent {
        match self {
            PipelineError::Failed { reason, .. } => ProgressEvent::Error {
                phase: Some(reason.stage()),
                reason: Some(reason.code().to_string()),
                message: self.to_string(),
            },
            PipelineError::Aborted { stage, .. } => ProgressEvent::Error {
                phase: Some(*stage),
                reason: None,
                message: self.to_string(),
            },
            PipelineError::Internal(_) => ProgressEvent::Error {
                phase: None,
                reason: None,
                message: self.to_string(),
            },
        }
    }
}

/// Map a provider failure inside `stage` to that stage's failure reason
fn stage_failure(stage: StageId, error: CompletionError) -> PipelineError {
    PipelineError::Failed {
        reason: FailureReason::for_stage(stage),
        detail: error.to_string(),
    }
}

fn empty_output(stage: StageId) -> PipelineError {
    PipelineError::Failed {
        reason: FailureReason::for_stage(stage),
        detail: "no usable content".to_string(),
    }
}

/// Runs generation requests through the four stages
///
/// Holds no per-run state; concurrent runs share only the provider client.
pub struct StagePipeline {
    provider: Arc<dyn CompletionProvider>,
    config: PipelineConfig,
}

impl StagePipeline {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: PipelineConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run all four stages, reporting progress to `sink`
    ///
    /// Emits exactly one terminal event unless the sink itself went away.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        sink: &dyn ProgressSink,
    ) -> Result<GeneratedArticle, PipelineError> {
        let mut run = PipelineRun::new();
        let started = Instant::now();
        info!(
            run_id = %run.run_id,
            topic = %request.topic(),
            "Generation run started"
        );

        match self.run_stages(&mut run, request, sink).await {
            Ok(article) => {
                let complete = ProgressEvent::Complete {
                    final_article: article.final_article.clone(),
                    plan: Some(self.plan_for_transport(&article.plan)),
                };
                if let Err(e) = sink.emit(complete).await {
                    debug!(run_id = %run.run_id, "Completion event not delivered: {}", e);
                }

                info!(
                    run_id = %run.run_id,
                    chars = article.final_article.chars().count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Generation run complete"
                );
                Ok(article)
            }
            Err(err) => {
                if let PipelineError::Aborted { stage, .. } = &err {
                    warn!(
                        run_id = %run.run_id,
                        stage = %stage,
                        "Progress consumer gone, generation stopped"
                    );
                    return Err(err);
                }

                if let Some(reason) = err.failure_reason() {
                    if let Err(e) = run.fail(reason) {
                        debug!(run_id = %run.run_id, "{}", e);
                    }
                }
                error!(
                    run_id = %run.run_id,
                    state = ?run.state,
                    "Generation run failed: {}",
                    err
                );

                if let Err(e) = sink.emit(err.to_event()).await {
                    debug!(run_id = %run.run_id, "Error event not delivered: {}", e);
                }
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        run: &mut PipelineRun,
        request: &GenerationRequest,
        sink: &dyn ProgressSink,
    ) -> Result<GeneratedArticle, PipelineError> {
        let plan = self.phase_planning(run, request, sink).await?;
        let draft = self.phase_drafting(run, &plan.content, sink).await?;

        let draft_view = self.review_view(&draft);
        let critique = self.phase_reviewing(run, draft_view, sink).await?;
        let final_article = self
            .phase_finalizing(run, draft_view, &critique.content, sink)
            .await?;

        Ok(GeneratedArticle {
            plan: plan.content,
            draft: draft.content,
            critique: critique.content,
            final_article: final_article.content,
        })
    }

    /// Draft as seen by the reviewing and finalizing stages
    fn review_view<'a>(&self, draft: &'a StageResult) -> &'a str {
        let (view, truncated) = truncate_chars(&draft.content, self.config.review_cutoff_chars);
        if truncated {
            warn!(
                original_chars = draft.content.chars().count(),
                cutoff = self.config.review_cutoff_chars,
                "Draft truncated before review"
            );
        }
        view
    }

    /// Plan capped for delivery to the client
    pub fn plan_for_transport(&self, plan: &str) -> String {
        match self.config.plan_transport_limit {
            Some(limit) => truncate_chars(plan, limit).0.to_string(),
            None => plan.to_string(),
        }
    }

    async fn emit(
        &self,
        sink: &dyn ProgressSink,
        stage: StageId,
        event: ProgressEvent,
    ) -> Result<(), PipelineError> {
        sink.emit(event)
            .await
            .map_err(|cause| PipelineError::Aborted { stage, cause })
    }

    async fn start_stage(
        &self,
        run: &PipelineRun,
        sink: &dyn ProgressSink,
        stage: StageId,
        message: &str,
    ) -> Result<(), PipelineError> {
        info!(run_id = %run.run_id, stage = %stage, "Stage {} started", stage.number());
        self.emit(
            sink,
            stage,
            ProgressEvent::PhaseStart {
                phase: stage,
                message: message.to_string(),
            },
        )
        .await
    }

    /// Report a finished stage and advance the run
    async fn finish_stage(
        &self,
        run: &mut PipelineRun,
        sink: &dyn ProgressSink,
        result: &StageResult,
    ) -> Result<(), PipelineError> {
        let data = (!result.stage.is_streamed()).then(|| result.content.clone());
        self.emit(
            sink,
            result.stage,
            ProgressEvent::PhaseDone {
                phase: result.stage,
                data,
                truncated: result.truncated,
            },
        )
        .await?;

        run.advance()
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        info!(
            run_id = %run.run_id,
            stage = %result.stage,
            chars = result.content.chars().count(),
            "Stage {} done",
            result.stage.number()
        );
        Ok(())
    }

    /// One non-streaming call; blank text counts as a failure
    async fn complete_stage(
        &self,
        stage: StageId,
        prompt: &str,
        max_output: u32,
    ) -> Result<String, PipelineError> {
        let text = self
            .provider
            .complete(prompt, max_output)
            .await
            .map_err(|e| stage_failure(stage, e))?;

        if text.trim().is_empty() {
            return Err(empty_output(stage));
        }
        Ok(text)
    }

    /// One streaming call, forwarding each fragment and accumulating the whole
    async fn stream_stage(
        &self,
        stage: StageId,
        prompt: &str,
        max_output: u32,
        sink: &dyn ProgressSink,
    ) -> Result<String, PipelineError> {
        let mut fragments = self
            .provider
            .complete_stream(prompt, max_output)
            .await
            .map_err(|e| stage_failure(stage, e))?;

        let mut content = String::new();
        let mut count = 0usize;
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(|e| stage_failure(stage, e))?;
            content.push_str(&fragment);
            count += 1;
            self.emit(
                sink,
                stage,
                ProgressEvent::PhaseChunk {
                    phase: stage,
                    chunk: fragment,
                },
            )
            .await?;
        }

        debug!(stage = %stage, fragments = count, "Stream finished");
        if content.trim().is_empty() {
            return Err(empty_output(stage));
        }
        Ok(content)
    }
}
