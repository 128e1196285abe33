//! Stage 2: DRAFTING
//!
//! Full article body from the outline, streamed fragment by fragment

use super::{prompts, PipelineError, StagePipeline};
use crate::models::{PipelineRun, StageResult};
use crate::services::progress_emitter::ProgressSink;
use redactor_common::StageId;

impl StagePipeline {
    pub(super) async fn phase_drafting(
        &self,
        run: &mut PipelineRun,
        outline: &str,
        sink: &dyn ProgressSink,
    ) -> Result<StageResult, PipelineError> {
        let stage = StageId::Drafting;
        self.start_stage(run, sink, stage, "Writing the draft...")
            .await?;

        let prompt = prompts::drafting_prompt(outline);
        let draft = self
            .stream_stage(stage, &prompt, self.config.drafting_max_output, sink)
            .await?;

        // Flags that later stages only see a prefix of this draft
        let truncated = draft.chars().count() > self.config.review_cutoff_chars;
        let result = StageResult::new(stage, draft, truncated);
        self.finish_stage(run, sink, &result).await?;
        Ok(result)
    }
}
