use async_trait::async_trait;

use crate::errors::GridPilotResult;
use crate::perception::types::ScreenArtifact;

/// Produces the screen image the planner decides on.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn capture(&self) -> GridPilotResult<ScreenArtifact>;
}
