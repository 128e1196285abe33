//! Stage 3: REVIEWING
//!
//! Critique of the (capped) draft, one non-streaming call

use super::{prompts, PipelineError, StagePipeline};
use crate::models::{PipelineRun, StageResult};
use crate::services::progress_emitter::ProgressSink;
use redactor_common::StageId;

impl StagePipeline {
    pub(super) async fn phase_reviewing(
        &self,
        run: &mut PipelineRun,
        draft_view: &str,
        sink: &dyn ProgressSink,
    ) -> Result<StageResult, PipelineError> {
        let stage = StageId::Reviewing;
        self.start_stage(run, sink, stage, "Reviewing the draft...")
            .await?;

        let prompt = prompts::reviewing_prompt(draft_view);
        let critique = self
            .complete_stage(stage, &prompt, self.config.reviewing_max_output)
            .await?;

        let result = StageResult::new(stage, critique, false);
        self.finish_stage(run, sink, &result).await?;
        Ok(result)
    }
}
