use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use http::StatusCode;
use tusk_app::api::APIHandler;
use tusk_grammar::pipeline::{ParsePipeline, ParseRequest, ParseResponse};

/// Serves `POST /parse`.
pub struct ParseAPIHandler {
    pipeline: ParsePipeline,
}

impl ParseAPIHandler {
    /// Creates a new `ParseAPIHandler` that runs requests through `pipeline`.
    pub fn new(pipeline: ParsePipeline) -> Self {
        Self { pipeline }
    }

    async fn parse_handler(State(pipeline): State<ParsePipeline>, body: Bytes) -> (StatusCode, Json<ParseResponse>) {
        let request = ParseRequest::from_json(&body);
        let (status, response) = pipeline.run(request).await;
        (status, Json(response))
    }
}

impl APIHandler for ParseAPIHandler {
    type State = ParsePipeline;

    fn generate_initial_state(&self) -> Self::State {
        self.pipeline.clone()
    }

    fn generate_routes(&self) -> Router<Self::State> {
        Router::new().route("/parse", post(Self::parse_handler))
    }
}
