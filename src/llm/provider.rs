use async_trait::async_trait;

use crate::llm::types::{PlanRequest, PlanResponse};

/// The remote decision step. Implementations fold transport errors, bad
/// status codes and malformed payloads into `PlanResponse::unsuccessful()`
/// so the loop never sees them as errors.
#[async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    async fn act(&self, request: &PlanRequest) -> PlanResponse;
}
