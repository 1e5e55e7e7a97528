use crate::error::Error;
use crate::pipeline::{RequestContext, Stage, StageResult};
use async_trait::async_trait;

/// Last stage of the pipeline: whatever reaches it has no handler.
pub struct MissingHandler;

#[async_trait]
impl Stage for MissingHandler {
    fn name(&self) -> &'static str {
        "missing_handler"
    }

    async fn try_handle(&self, _ctx: &mut RequestContext) -> StageResult {
        Err(Error::missing_handler())
    }
}
