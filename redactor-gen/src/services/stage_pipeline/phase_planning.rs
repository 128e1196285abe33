//! Stage 1: PLANNING
//!
//! Outline from topic and optional title, one non-streaming call

use super::{prompts, PipelineError, StagePipeline};
use crate::models::{GenerationRequest, PipelineRun, StageResult};
use crate::services::progress_emitter::ProgressSink;
use redactor_common::StageId;

impl StagePipeline {
    pub(super) async fn phase_planning(
        &self,
        run: &mut PipelineRun,
        request: &GenerationRequest,
        sink: &dyn ProgressSink,
    ) -> Result<StageResult, PipelineError> {
        let stage = StageId::Planning;
        self.start_stage(run, sink, stage, "Planning the article outline...")
            .await?;

        let prompt = prompts::planning_prompt(request.topic(), request.title());
        let outline = self
            .complete_stage(stage, &prompt, self.config.planning_max_output)
            .await?;

        let result = StageResult::new(stage, outline, false);
        self.finish_stage(run, sink, &result).await?;
        Ok(result)
    }
}
