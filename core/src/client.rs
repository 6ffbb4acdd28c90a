//! Stateless HTTP request builder and response parser for the AgriPredict API.
//!
//! # Design
//! `AgriClient` holds only a `base_url` and carries no mutable state between
//! calls. Each endpoint is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The caller executes the actual HTTP round-trip, keeping the core
//! deterministic and free of I/O dependencies.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::multipart;
use crate::types::{
    EdaPlots, ImageData, MissingValueStrategy, OptimizeInput, OptimizedInputs, Prediction,
    PredictionInput, PreprocessOutcome, ShapImage, TrainMetrics, TrainRequest, UploadFile,
    UploadReceipt,
};

/// Origin the backend listens on when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Synchronous, stateless client for the AgriPredict API.
#[derive(Debug, Clone)]
pub struct AgriClient {
    base_url: String,
}

impl Default for AgriClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl AgriClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_upload(&self, file: &UploadFile) -> HttpRequest {
        let boundary = multipart::new_boundary();
        let body = multipart::encode_file(&boundary, "file", file);
        self.request(
            HttpMethod::Post,
            "/upload/",
            vec![("content-type".to_string(), multipart::content_type(&boundary))],
            Some(body),
        )
    }

    pub fn build_eda_summary(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/eda/summary", Vec::new(), None)
    }

    pub fn build_eda_plots(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/eda/plots", Vec::new(), None)
    }

    pub fn build_preprocess(&self, strategy: MissingValueStrategy) -> HttpRequest {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("strategy", strategy.as_str())
            .finish();
        self.request(
            HttpMethod::Post,
            &format!("/preprocess/missing?{query}"),
            Vec::new(),
            None,
        )
    }

    pub fn build_train(&self, input: &TrainRequest) -> HttpRequest {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("target", &input.target);
        if let Some(test_size) = input.test_size {
            query.append_pair("test_size", &test_size.to_string());
        }
        self.request(
            HttpMethod::Post,
            &format!("/train/?{}", query.finish()),
            Vec::new(),
            None,
        )
    }

    pub fn build_predict(&self, input: &PredictionInput) -> Result<HttpRequest, ApiError> {
        self.json_request("/predict/", input)
    }

    pub fn build_optimize(&self, input: &OptimizeInput) -> Result<HttpRequest, ApiError> {
        self.json_request("/optimize/", input)
    }

    pub fn build_shap_summary(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/shap/summary", Vec::new(), None)
    }

    pub fn build_shap_bar(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/shap/bar", Vec::new(), None)
    }

    /// Only the status matters for an upload. A body that is not a receipt
    /// still counts as success.
    pub fn parse_upload(&self, response: HttpResponse) -> Result<UploadReceipt, ApiError> {
        check_status(&response)?;
        let value: Value = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(_) => return Ok(UploadReceipt::default()),
        };
        if let Some(message) = server_error(&value) {
            return Err(ApiError::ServerError(message));
        }
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// The summary shape is defined by the server, so it is returned as raw
    /// JSON for display. Any JSON body is shown as is, an `{"error": ..}`
    /// body or an error status included. Only a body that is not JSON fails.
    pub fn parse_eda_summary(&self, response: HttpResponse) -> Result<Value, ApiError> {
        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(value),
            Err(e) => {
                check_status(&response)?;
                Err(ApiError::DeserializationError(e.to_string()))
            }
        }
    }

    /// Plots come back as a `name -> base64` object; key order is kept.
    pub fn parse_eda_plots(&self, response: HttpResponse) -> Result<EdaPlots, ApiError> {
        let map: serde_json::Map<String, Value> = parse_json(&response)?;
        let plots = map
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(payload) => Ok((name, ImageData(payload))),
                other => Err(ApiError::DeserializationError(format!(
                    "plot {name:?} is not a base64 string: {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EdaPlots { plots })
    }

    pub fn parse_preprocess(&self, response: HttpResponse) -> Result<PreprocessOutcome, ApiError> {
        parse_json(&response)
    }

    pub fn parse_train(&self, response: HttpResponse) -> Result<TrainMetrics, ApiError> {
        parse_json(&response)
    }

    pub fn parse_predict(&self, response: HttpResponse) -> Result<Prediction, ApiError> {
        parse_json(&response)
    }

    pub fn parse_optimize(&self, response: HttpResponse) -> Result<OptimizedInputs, ApiError> {
        parse_json(&response)
    }

    pub fn parse_shap(&self, response: HttpResponse) -> Result<ShapImage, ApiError> {
        parse_json(&response)
    }

    fn json_request<T: Serialize>(&self, path: &str, input: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_vec(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(
            HttpMethod::Post,
            path,
            vec![("content-type".to_string(), "application/json".to_string())],
            Some(body),
        ))
    }

    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> HttpRequest {
        let url = format!("{}{path}", self.base_url);
        debug!(method = method.as_str(), %url, "built request");
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

/// Map a non-2xx status to `HttpError`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

/// The backend reports some failures as `{"error": "..."}` with status 200.
fn server_error(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    match object.get("error")? {
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_status(response)?;
    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
    if let Some(message) = server_error(&value) {
        return Err(ApiError::ServerError(message));
    }
    serde_json::from_value(value).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AgriClient {
        AgriClient::new("http://localhost:8000")
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_eda_requests_are_plain_gets() {
        let summary = client().build_eda_summary();
        assert_eq!(summary.method, HttpMethod::Get);
        assert_eq!(summary.url, "http://localhost:8000/eda/summary");
        assert!(summary.body.is_none());
        assert!(summary.headers.is_empty());

        let plots = client().build_eda_plots();
        assert_eq!(plots.url, "http://localhost:8000/eda/plots");
    }

    #[test]
    fn build_upload_produces_multipart_request() {
        let file = UploadFile::csv("crops.csv", "a,b\n1,2\n");
        let req = client().build_upload(&file);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/upload/");

        let content_type = req.header("Content-Type").unwrap().to_string();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let body = String::from_utf8(req.body.clone().unwrap()).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("name=\"file\"; filename=\"crops.csv\""));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn build_preprocess_puts_strategy_in_query() {
        let req = client().build_preprocess(MissingValueStrategy::Median);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/preprocess/missing?strategy=median");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_train_encodes_target_and_test_size() {
        let req = client().build_train(&TrainRequest {
            target: "yield_kg_per_ha".to_string(),
            test_size: Some(0.25),
        });
        assert_eq!(
            req.url,
            "http://localhost:8000/train/?target=yield_kg_per_ha&test_size=0.25"
        );
    }

    #[test]
    fn build_train_omits_missing_test_size_and_escapes_target() {
        let req = client().build_train(&TrainRequest {
            target: "yield & more".to_string(),
            test_size: None,
        });
        assert_eq!(req.url, "http://localhost:8000/train/?target=yield+%26+more");
    }

    #[test]
    fn build_optimize_sends_nine_fields() {
        let input = OptimizeInput {
            soil_ph: 6.8,
            soil_n: 35.0,
            soil_p: 20.0,
            rainfall_mm: 650.0,
            temp_avg: 26.0,
            month: 7,
            day_of_year: 190,
            year: 2023,
            crop_type: "rice".to_string(),
        };
        let req = client().build_optimize(&input).unwrap();
        assert_eq!(req.url, "http://localhost:8000/optimize/");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body.as_object().unwrap().len(), 9);
        assert!(body.get("fertilizer_kg_per_ha").is_none());
        assert_eq!(body["soil_pH"], 6.8);
    }

    #[test]
    fn build_shap_requests() {
        assert_eq!(client().build_shap_summary().url, "http://localhost:8000/shap/summary");
        assert_eq!(client().build_shap_bar().url, "http://localhost:8000/shap/bar");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = AgriClient::new("http://localhost:8000/");
        assert_eq!(client.build_eda_summary().url, "http://localhost:8000/eda/summary");
    }

    #[test]
    fn parse_upload_tolerates_non_json_body() {
        let receipt = client().parse_upload(ok("saved")).unwrap();
        assert_eq!(receipt, UploadReceipt::default());
    }

    #[test]
    fn parse_upload_reads_receipt() {
        let receipt = client()
            .parse_upload(ok(r#"{"status":"success","file_path":"data/uploads/a.csv"}"#))
            .unwrap();
        assert_eq!(receipt.file_path.as_deref(), Some("data/uploads/a.csv"));
    }

    #[test]
    fn parse_upload_wrong_status() {
        let response = HttpResponse {
            status: 500,
            headers: Vec::new(),
            body: "internal error".to_string(),
        };
        let err = client().parse_upload(response).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
    }

    #[test]
    fn parse_eda_plots_keeps_server_order() {
        let plots = client()
            .parse_eda_plots(ok(r#"{"zeta":"Zg==","alpha":"YQ==","mid":"bQ=="}"#))
            .unwrap();
        let names: Vec<&str> = plots.plots.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn parse_eda_plots_rejects_non_string_payload() {
        let err = client().parse_eda_plots(ok(r#"{"a":1}"#)).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn error_body_becomes_server_error() {
        let err = client()
            .parse_eda_plots(ok(r#"{"error":"No uploaded file found."}"#))
            .unwrap_err();
        match err {
            ApiError::ServerError(message) => assert_eq!(message, "No uploaded file found."),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_train_non_numeric_score() {
        let err = client().parse_train(ok(r#"{"r2_score":"high"}"#)).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_predict_bad_json() {
        let err = client().parse_predict(ok("not json")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_shap_reads_image() {
        let shap = client().parse_shap(ok(r#"{"image":"iVBORw0KGgo="}"#)).unwrap();
        assert_eq!(shap.image.base64(), "iVBORw0KGgo=");
    }

    #[test]
    fn parse_accepts_any_2xx() {
        let response = HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: r#"{"prediction": 10.0}"#.to_string(),
        };
        assert_eq!(client().parse_predict(response).unwrap().prediction, 10.0);
    }

    #[test]
    fn eda_summary_keeps_error_bodies_for_display() {
        let value = client()
            .parse_eda_summary(ok(r#"{"error":"No uploaded file found."}"#))
            .unwrap();
        assert_eq!(value["error"], "No uploaded file found.");

        let response = HttpResponse {
            status: 500,
            headers: Vec::new(),
            body: r#"{"detail":"boom"}"#.to_string(),
        };
        assert_eq!(client().parse_eda_summary(response).unwrap()["detail"], "boom");
    }

    #[test]
    fn eda_summary_non_json_body_fails() {
        let response = HttpResponse {
            status: 502,
            headers: Vec::new(),
            body: "Bad Gateway".to_string(),
        };
        let err = client().parse_eda_summary(response).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 502, .. }));

        let err = client().parse_eda_summary(ok("<html>")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
