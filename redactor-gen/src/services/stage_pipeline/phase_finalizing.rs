//! Stage 4: FINALIZING
//!
//! Polished article from the capped draft and the critique, streamed. Code
//! fence markers are stripped from the accumulated output.

use super::{empty_output, prompts, PipelineError, StagePipeline};
use crate::models::{PipelineRun, StageResult};
use crate::services::progress_emitter::ProgressSink;
use redactor_common::text::strip_code_fences;
use redactor_common::StageId;

impl StagePipeline {
    pub(super) async fn phase_finalizing(
        &self,
        run: &mut PipelineRun,
        draft_view: &str,
        critique: &str,
        sink: &dyn ProgressSink,
    ) -> Result<StageResult, PipelineError> {
        let stage = StageId::Finalizing;
        self.start_stage(run, sink, stage, "Applying the review to the final version...")
            .await?;

        let prompt = prompts::finalizing_prompt(draft_view, critique);
        let raw = self
            .stream_stage(stage, &prompt, self.config.finalizing_max_output, sink)
            .await?;

        let article = strip_code_fences(&raw);
        if article.trim().is_empty() {
            return Err(empty_output(stage));
        }

        let result = StageResult::new(stage, article, false);
        self.finish_stage(run, sink, &result).await?;
        Ok(result)
    }
}
