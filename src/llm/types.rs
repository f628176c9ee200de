use serde::{Deserialize, Serialize};

/// Body of the POST sent to the decision service.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest {
    pub instruction: String,
    /// Newline-joined recent history window; may be empty.
    pub stage2_history: String,
    /// Base64 JPEG.
    pub image: String,
}

/// The service's answer. `xml` holds the tagged tool-call fragment, not XML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlanResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub xml: String,
    #[serde(default)]
    pub raw: String,
}

impl PlanResponse {
    pub fn unsuccessful() -> Self {
        Self::default()
    }
}
