use async_trait::async_trait;

use crate::config::PlannerConfig;
use crate::errors::{GridPilotError, GridPilotResult};
use crate::llm::provider::Planner;
use crate::llm::types::{PlanRequest, PlanResponse};

/// Talks to the `/act` endpoint of the remote decision service.
pub struct HttpActPlanner {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpActPlanner {
    pub fn new(config: &PlannerConfig) -> GridPilotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    async fn post(&self, request: &PlanRequest) -> GridPilotResult<PlanResponse> {
        tracing::debug!(
            endpoint = %self.endpoint,
            instruction = %request.instruction,
            history = %request.stage2_history,
            image_len = request.image.len(),
            "sending act request (image omitted)"
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GridPilotError::Planner(format!("{status}: {body}")));
        }

        let body = response.text().await?;
        let parsed: PlanResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }
}

#[async_trait]
impl Planner for HttpActPlanner {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn act(&self, request: &PlanRequest) -> PlanResponse {
        match self.post(request).await {
            Ok(response) => {
                tracing::info!(
                    success = response.success,
                    raw_len = response.raw.len(),
                    tool_call_len = response.xml.len(),
                    "act response received"
                );
                response
            }
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %self.endpoint, "planner call failed");
                PlanResponse::unsuccessful()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn planner_for(server_url: String) -> HttpActPlanner {
        let config = PlannerConfig {
            server_url,
            timeout_secs: 5,
            ..PlannerConfig::default()
        };
        HttpActPlanner::new(&config).unwrap()
    }

    fn request() -> PlanRequest {
        PlanRequest {
            instruction: "Open notepad".into(),
            stage2_history: "Clicked the start menu.".into(),
            image: "aGVsbG8=".into(),
        }
    }

    #[tokio::test]
    async fn successful_response_is_passed_through() {
        let router = Router::new().route(
            "/act",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(json!({
                    "success": true,
                    "xml": "<tool_call>{}</tool_call>",
                    "raw": format!(
                        "{}|{}|{}",
                        body["instruction"].as_str().unwrap_or(""),
                        body["stage2_history"].as_str().unwrap_or(""),
                        body["image"].as_str().unwrap_or(""),
                    ),
                }))
            }),
        );
        let planner = planner_for(serve(router).await);

        let response = planner.act(&request()).await;

        assert!(response.success);
        assert_eq!(response.xml, "<tool_call>{}</tool_call>");
        assert_eq!(response.raw, "Open notepad|Clicked the start menu.|aGVsbG8=");
    }

    #[tokio::test]
    async fn non_success_status_is_unsuccessful() {
        let router = Router::new().route(
            "/act",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let planner = planner_for(serve(router).await);

        assert_eq!(planner.act(&request()).await, PlanResponse::unsuccessful());
    }

    #[tokio::test]
    async fn malformed_payload_is_unsuccessful() {
        let router = Router::new().route("/act", post(|| async { "definitely not json" }));
        let planner = planner_for(serve(router).await);

        assert!(!planner.act(&request()).await.success);
    }

    #[tokio::test]
    async fn missing_success_field_counts_as_failure() {
        let router = Router::new().route(
            "/act",
            post(|| async { Json(json!({ "xml": "<terminate/>" })) }),
        );
        let planner = planner_for(serve(router).await);

        let response = planner.act(&request()).await;
        assert!(!response.success);
        assert_eq!(response.xml, "<terminate/>");
    }

    #[tokio::test]
    async fn connection_refused_is_unsuccessful() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let planner = planner_for(format!("http://{addr}"));

        assert!(!planner.act(&request()).await.success);
    }
}
