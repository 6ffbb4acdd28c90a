//! Domain DTOs for the AgriPredict API.
//!
//! # Design
//! Request types serialize to the exact JSON keys the backend expects
//! (`soil_pH`, `soil_N`, ...), so Rust-side names stay snake_case and the
//! wire names live in `#[serde(rename)]`. Response types only declare the
//! fields the client renders; extra keys are ignored.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A file picked for upload, sent as the `file` part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// A CSV upload. The backend only reads CSV files.
    pub fn csv(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "text/csv".to_string(),
            bytes: bytes.into(),
        }
    }
}

/// How the backend fills missing values during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValueStrategy {
    Mean,
    Median,
    Mode,
}

impl MissingValueStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MissingValueStrategy::Mean => "mean",
            MissingValueStrategy::Median => "median",
            MissingValueStrategy::Mode => "mode",
        }
    }
}

impl fmt::Display for MissingValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissingValueStrategy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(MissingValueStrategy::Mean),
            "median" => Ok(MissingValueStrategy::Median),
            "mode" => Ok(MissingValueStrategy::Mode),
            _ => Err(ApiError::invalid("strategy", Some(s.to_string()))),
        }
    }
}

/// Query parameters for `POST /train/`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRequest {
    pub target: String,
    /// `None` leaves the parameter off so the server default applies.
    pub test_size: Option<f64>,
}

/// Full feature record for `POST /predict/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    #[serde(rename = "soil_pH")]
    pub soil_ph: f64,
    #[serde(rename = "soil_N")]
    pub soil_n: f64,
    #[serde(rename = "soil_P")]
    pub soil_p: f64,
    pub rainfall_mm: f64,
    pub temp_avg: f64,
    pub fertilizer_kg_per_ha: f64,
    pub irrigation_mm: f64,
    pub pesticide_ml: f64,
    pub month: u32,
    pub day_of_year: u32,
    pub year: i32,
    pub input_cost_total: f64,
    pub environmental_score: f64,
    pub crop_type: String,
}

/// The non-optimizable subset of `PredictionInput` sent to `POST /optimize/`.
/// Fertilizer, irrigation, pesticide, cost and environmental score are what
/// the backend solves for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeInput {
    #[serde(rename = "soil_pH")]
    pub soil_ph: f64,
    #[serde(rename = "soil_N")]
    pub soil_n: f64,
    #[serde(rename = "soil_P")]
    pub soil_p: f64,
    pub rainfall_mm: f64,
    pub temp_avg: f64,
    pub month: u32,
    pub day_of_year: u32,
    pub year: i32,
    pub crop_type: String,
}

/// Body of a successful upload. The client only needs the 2xx status, so
/// both fields are optional and an unreadable body yields the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Result of `POST /preprocess/missing`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreprocessOutcome {
    /// The backend names this key `processed_file`; older builds used
    /// `output_file`.
    #[serde(alias = "processed_file")]
    pub output_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrainMetrics {
    pub r2_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Prediction {
    pub prediction: f64,
}

/// Best input combination found by `POST /optimize/`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OptimizedInputs {
    pub fertilizer_kg_per_ha: f64,
    pub irrigation_mm: f64,
    pub pesticide_ml: f64,
    #[serde(rename = "yield")]
    pub predicted_yield: f64,
    pub input_cost_total: f64,
    pub environmental_score: f64,
}

/// A base64-encoded PNG as returned by the plot endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ImageData(pub String);

impl ImageData {
    pub fn base64(&self) -> &str {
        &self.0
    }

    /// `data:image/png;base64,<payload>`, suitable for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.0)
    }

    /// Inverse of `data_uri`. `None` for anything that is not a base64 PNG URI.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix("data:image/png;base64,")
            .filter(|payload| !payload.is_empty())
            .map(|payload| ImageData(payload.to_string()))
    }

    /// Decode the payload into raw PNG bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ApiError> {
        STANDARD
            .decode(self.0.trim())
            .map_err(|e| ApiError::DeserializationError(format!("invalid base64 image: {e}")))
    }
}

/// Named EDA plots in the order the server listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdaPlots {
    pub plots: Vec<(String, ImageData)>,
}

impl EdaPlots {
    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }
}

/// Body of `GET /shap/summary` and `GET /shap/bar`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShapImage {
    pub image: ImageData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_input_uses_wire_names() {
        let input = PredictionInput {
            soil_ph: 6.5,
            soil_n: 40.0,
            soil_p: 25.0,
            rainfall_mm: 800.0,
            temp_avg: 24.0,
            fertilizer_kg_per_ha: 120.0,
            irrigation_mm: 200.0,
            pesticide_ml: 50.0,
            month: 6,
            day_of_year: 160,
            year: 2024,
            input_cost_total: 110.5,
            environmental_score: 140.2,
            crop_type: "wheat".to_string(),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["soil_pH"], 6.5);
        assert_eq!(json["soil_N"], 40.0);
        assert_eq!(json["soil_P"], 25.0);
        assert_eq!(json["month"], 6);
        assert_eq!(json["crop_type"], "wheat");
        assert_eq!(json.as_object().unwrap().len(), 14);
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Median".parse::<MissingValueStrategy>().unwrap(), MissingValueStrategy::Median);
        assert_eq!(" mode ".parse::<MissingValueStrategy>().unwrap(), MissingValueStrategy::Mode);
        let err = "drop".parse::<MissingValueStrategy>().unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { ref field, .. } if field == "strategy"));
    }

    #[test]
    fn preprocess_outcome_accepts_both_key_names() {
        let a: PreprocessOutcome = serde_json::from_str(r#"{"output_file":"a.csv"}"#).unwrap();
        let b: PreprocessOutcome = serde_json::from_str(r#"{"processed_file":"b.csv"}"#).unwrap();
        assert_eq!(a.output_file, "a.csv");
        assert_eq!(b.output_file, "b.csv");
    }

    #[test]
    fn optimized_inputs_reads_yield_keyword() {
        let body = r#"{"fertilizer_kg_per_ha":250.0,"irrigation_mm":250.0,"pesticide_ml":170.0,
            "yield":4200.5,"input_cost_total":245.9,"environmental_score":240.6}"#;
        let best: OptimizedInputs = serde_json::from_str(body).unwrap();
        assert_eq!(best.predicted_yield, 4200.5);
    }

    #[test]
    fn image_data_uri_and_decode() {
        let image = ImageData("iVBORw0KGgo=".to_string());
        assert_eq!(image.data_uri(), "data:image/png;base64,iVBORw0KGgo=");
        let bytes = image.decode().unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn image_from_data_uri() {
        let image = ImageData::from_data_uri("data:image/png;base64,QUJD").unwrap();
        assert_eq!(image.base64(), "QUJD");
        assert!(ImageData::from_data_uri("data:image/png;base64,").is_none());
        assert!(ImageData::from_data_uri("https://example.com/a.png").is_none());
    }

    #[test]
    fn image_decode_rejects_garbage() {
        let err = ImageData("not base64!".to_string()).decode().unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
