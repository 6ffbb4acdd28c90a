//! In-memory stand-in for the AgriPredict backend.
//!
//! Serves the same routes, query parameters and JSON shapes as the real
//! service. Uploaded CSVs are parsed and kept in memory; training and the
//! explainability plots are simulated with a fixed yield surrogate so
//! responses are deterministic.

use std::{path::Path, sync::Arc};

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

/// A 1x1 PNG, base64-encoded. Every plot endpoint returns it.
pub const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAIAAACQd1PeAAAADElEQVR4nGPQ6w4HAAH7ARF0JhTpAAAAAElFTkSuQmCC";

pub const NO_UPLOAD: &str = "No uploaded file found.";
pub const NO_PROCESSED: &str = "No processed file found. Run preprocess first.";

const MAX_COST: f64 = 12_000.0;
const MAX_ENV: f64 = 10_000.0;

/// A parsed CSV upload.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub file_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct TrainedModel {
    pub target: String,
    pub r2_score: f64,
}

#[derive(Debug, Default)]
pub struct Backend {
    pub upload: Option<Dataset>,
    pub processed: Option<String>,
    pub model: Option<TrainedModel>,
}

pub type Db = Arc<RwLock<Backend>>;

type Rejection = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, Rejection>;

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/upload/", post(upload))
        .route("/eda/summary", get(eda_summary))
        .route("/eda/plots", get(eda_plots))
        .route("/preprocess/missing", post(preprocess))
        .route("/train/", post(train))
        .route("/predict/", post(predict))
        .route("/optimize/", post(optimize))
        .route("/shap/summary", get(shap_plot))
        .route("/shap/bar", get(shap_plot))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn reject(status: StatusCode, detail: impl Into<String>) -> Rejection {
    let detail: String = detail.into();
    (status, Json(json!({ "detail": detail })))
}

/// The backend reports missing prerequisites in the body, not the status.
fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "error": message }))
}

impl Dataset {
    pub fn from_csv(file_name: &str, bytes: &[u8]) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);
        let columns = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(|cell| cell.trim().to_string()).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self {
            file_name: file_name.to_string(),
            columns,
            rows,
        })
    }

    fn cells(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }

    fn missing(&self, index: usize) -> usize {
        self.cells(index).filter(|cell| cell.is_empty()).count()
    }

    /// pandas-style dtype: integer columns with gaps become float64.
    fn dtype(&self, index: usize) -> &'static str {
        let present: Vec<&str> = self.cells(index).filter(|c| !c.is_empty()).collect();
        let all_int = present.iter().all(|c| c.parse::<i64>().is_ok());
        let all_float = present.iter().all(|c| c.parse::<f64>().is_ok());
        if present.is_empty() {
            "float64"
        } else if all_int && self.missing(index) == 0 {
            "int64"
        } else if all_float {
            "float64"
        } else {
            "object"
        }
    }

    fn numeric(&self, index: usize) -> Option<Vec<f64>> {
        if self.dtype(index) == "object" {
            return None;
        }
        Some(
            self.cells(index)
                .filter_map(|c| c.parse::<f64>().ok())
                .collect(),
        )
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn summary(&self) -> Value {
        let mut missing = Map::new();
        let mut dtypes = Map::new();
        let mut describe = Map::new();
        for (index, column) in self.columns.iter().enumerate() {
            missing.insert(column.clone(), json!(self.missing(index)));
            dtypes.insert(column.clone(), json!(self.dtype(index)));
            if let Some(values) = self.numeric(index).filter(|v| !v.is_empty()) {
                let count = values.len() as f64;
                let mean = values.iter().sum::<f64>() / count;
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                describe.insert(
                    column.clone(),
                    json!({ "count": count, "mean": mean, "min": min, "max": max }),
                );
            }
        }
        json!({
            "shape": [self.rows.len(), self.columns.len()],
            "columns": self.columns,
            "missing": missing,
            "dtypes": dtypes,
            "describe": describe,
        })
    }

    pub fn plots(&self) -> Value {
        let has_yield = self.has_column("yield_kg_per_ha");
        let mut names = vec!["missing_values", "correlation_heatmap"];
        if has_yield {
            names.push("yield_distribution");
        }
        if has_yield && self.has_column("rainfall_mm") {
            names.push("scatter_rainfall_yield");
        }
        names.extend(["boxplot_numeric", "pairplot", "outlier_percentages"]);

        let plots: Map<String, Value> = names
            .into_iter()
            .map(|name| (name.to_string(), json!(PLACEHOLDER_PNG)))
            .collect();
        Value::Object(plots)
    }
}

// ---------------------------------------------------------------------------
// Yield surrogate
// ---------------------------------------------------------------------------

/// Field conditions the optimizer cannot change.
#[derive(Clone, Copy, Debug)]
pub struct Conditions {
    pub soil_ph: f64,
    pub soil_n: f64,
    pub soil_p: f64,
    pub rainfall_mm: f64,
    pub temp_avg: f64,
}

/// Concave in each input, so the optimum sits inside the search grid.
pub fn surrogate_yield(c: &Conditions, fertilizer: f64, irrigation: f64, pesticide: f64) -> f64 {
    let soil = 120.0 * (7.0 - (c.soil_ph - 6.5).abs()) + 2.0 * c.soil_n + 1.5 * c.soil_p;
    let climate = 0.8 * c.rainfall_mm - 6.0 * (c.temp_avg - 24.0).powi(2);
    let inputs = 6.0 * fertilizer - 0.012 * fertilizer.powi(2) + 4.0 * irrigation
        - 0.008 * irrigation.powi(2)
        + 3.0 * pesticide
        - 0.009 * pesticide.powi(2);
    soil + climate + inputs
}

pub fn compute_cost(fertilizer: f64, irrigation: f64, pesticide: f64) -> f64 {
    0.50165 * fertilizer + 0.20026 * irrigation + 0.14837 * pesticide + 20.19
}

pub fn compute_env(fertilizer: f64, irrigation: f64, pesticide: f64) -> f64 {
    0.60055 * fertilizer + 0.30009 * irrigation + 0.04946 * pesticide + 6.73
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Optimum {
    #[serde(rename = "yield")]
    pub predicted_yield: f64,
    pub fertilizer_kg_per_ha: f64,
    pub irrigation_mm: f64,
    pub pesticide_ml: f64,
    pub input_cost_total: f64,
    pub environmental_score: f64,
}

/// Exhaustive search over the input grid. The first best candidate wins ties.
pub fn optimize_inputs(conditions: &Conditions) -> Option<Optimum> {
    let mut best: Option<Optimum> = None;
    for fertilizer in (0..400).step_by(10).map(f64::from) {
        for irrigation in (0..400).step_by(10).map(f64::from) {
            for pesticide in (0..300).step_by(10).map(f64::from) {
                let cost = compute_cost(fertilizer, irrigation, pesticide);
                let env = compute_env(fertilizer, irrigation, pesticide);
                if cost > MAX_COST || env > MAX_ENV {
                    continue;
                }
                let predicted = surrogate_yield(conditions, fertilizer, irrigation, pesticide);
                if best.as_ref().map_or(true, |b| predicted > b.predicted_yield) {
                    best = Some(Optimum {
                        predicted_yield: predicted,
                        fertilizer_kg_per_ha: fertilizer,
                        irrigation_mm: irrigation,
                        pesticide_ml: pesticide,
                        input_cost_total: cost,
                        environmental_score: env,
                    });
                }
            }
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
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
    pub input_cost_total: f64,
    pub environmental_score: f64,
    pub month: i64,
    pub day_of_year: i64,
    pub year: i64,
    pub crop_type: String,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeInput {
    #[serde(rename = "soil_pH")]
    pub soil_ph: f64,
    #[serde(rename = "soil_N")]
    pub soil_n: f64,
    #[serde(rename = "soil_P")]
    pub soil_p: f64,
    pub rainfall_mm: f64,
    pub temp_avg: f64,
    pub month: i64,
    pub day_of_year: i64,
    pub year: i64,
    pub crop_type: String,
}

fn check_calendar(month: i64, day_of_year: i64, year: i64) -> Result<(), Rejection> {
    if !(1..=12).contains(&month) {
        return Err(reject(StatusCode::UNPROCESSABLE_ENTITY, "month must be within 1..=12"));
    }
    if !(1..=366).contains(&day_of_year) {
        return Err(reject(StatusCode::UNPROCESSABLE_ENTITY, "day_of_year must be within 1..=366"));
    }
    if !(2000..=2100).contains(&year) {
        return Err(reject(StatusCode::UNPROCESSABLE_ENTITY, "year must be within 2000..=2100"));
    }
    Ok(())
}

fn require_model(backend: &Backend) -> Result<&TrainedModel, Rejection> {
    backend
        .model
        .as_ref()
        .ok_or_else(|| reject(StatusCode::CONFLICT, "Model not trained. Run /train first."))
}

#[derive(Deserialize)]
struct PreprocessParams {
    #[serde(default = "default_strategy")]
    strategy: String,
}

fn default_strategy() -> String {
    "mean".to_string()
}

#[derive(Deserialize)]
struct TrainParams {
    #[serde(default = "default_target")]
    target: String,
    #[serde(default = "default_test_size")]
    test_size: f64,
}

fn default_target() -> String {
    "yield_kg_per_ha".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn upload(State(db): State<Db>, mut multipart: Multipart) -> ApiResult {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(StatusCode::BAD_REQUEST, e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| reject(StatusCode::BAD_REQUEST, e.body_text()))?;
        let dataset = Dataset::from_csv(&file_name, &bytes)
            .map_err(|e| reject(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
        info!(file = %file_name, rows = dataset.rows.len(), "stored upload");
        db.write().await.upload = Some(dataset);
        return Ok(Json(json!({
            "status": "success",
            "file_path": format!("data/uploads/{file_name}"),
        })));
    }
    Err(reject(StatusCode::UNPROCESSABLE_ENTITY, "field required: file"))
}

async fn eda_summary(State(db): State<Db>) -> Json<Value> {
    match &db.read().await.upload {
        Some(dataset) => Json(dataset.summary()),
        None => error_body(NO_UPLOAD),
    }
}

async fn eda_plots(State(db): State<Db>) -> Json<Value> {
    match &db.read().await.upload {
        Some(dataset) => Json(dataset.plots()),
        None => error_body(NO_UPLOAD),
    }
}

async fn preprocess(State(db): State<Db>, Query(params): Query<PreprocessParams>) -> ApiResult {
    if !matches!(params.strategy.as_str(), "mean" | "median" | "mode") {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown strategy {:?}", params.strategy),
        ));
    }
    let mut backend = db.write().await;
    let Some(dataset) = &backend.upload else {
        return Ok(error_body(NO_UPLOAD));
    };
    let stem = Path::new(&dataset.file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let processed = format!("data/processed/{stem}_{}.csv", params.strategy);
    info!(file = %processed, "preprocessed upload");
    backend.processed = Some(processed.clone());
    Ok(Json(json!({ "processed_file": processed })))
}

async fn train(State(db): State<Db>, Query(params): Query<TrainParams>) -> ApiResult {
    if !(params.test_size > 0.0 && params.test_size < 1.0) {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "test_size must be between 0 and 1",
        ));
    }
    let mut backend = db.write().await;
    if backend.processed.is_none() {
        return Ok(error_body(NO_PROCESSED));
    }
    let known = backend
        .upload
        .as_ref()
        .is_some_and(|d| d.has_column(&params.target));
    if !known {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown target column {:?}", params.target),
        ));
    }
    let r2_score = 0.93 - 0.2 * params.test_size;
    info!(target = %params.target, r2_score, "trained model");
    backend.model = Some(TrainedModel {
        target: params.target,
        r2_score,
    });
    Ok(Json(json!({ "r2_score": r2_score })))
}

async fn predict(State(db): State<Db>, Json(input): Json<PredictionInput>) -> ApiResult {
    check_calendar(input.month, input.day_of_year, input.year)?;
    let backend = db.read().await;
    require_model(&backend)?;
    let conditions = Conditions {
        soil_ph: input.soil_ph,
        soil_n: input.soil_n,
        soil_p: input.soil_p,
        rainfall_mm: input.rainfall_mm,
        temp_avg: input.temp_avg,
    };
    let prediction = surrogate_yield(
        &conditions,
        input.fertilizer_kg_per_ha,
        input.irrigation_mm,
        input.pesticide_ml,
    );
    Ok(Json(json!({ "prediction": prediction })))
}

async fn optimize(State(db): State<Db>, Json(input): Json<OptimizeInput>) -> ApiResult {
    check_calendar(input.month, input.day_of_year, input.year)?;
    let backend = db.read().await;
    require_model(&backend)?;
    let conditions = Conditions {
        soil_ph: input.soil_ph,
        soil_n: input.soil_n,
        soil_p: input.soil_p,
        rainfall_mm: input.rainfall_mm,
        temp_avg: input.temp_avg,
    };
    let best = optimize_inputs(&conditions).ok_or_else(|| {
        reject(StatusCode::UNPROCESSABLE_ENTITY, "no input combination satisfies the constraints")
    })?;
    serde_json::to_value(best)
        .map(Json)
        .map_err(|e| reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn shap_plot(State(db): State<Db>) -> ApiResult {
    let backend = db.read().await;
    require_model(&backend)?;
    Ok(Json(json!({ "image": PLACEHOLDER_PNG })))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "date,crop_type,soil_N,rainfall_mm,yield_kg_per_ha\n\
                       2024-01-02,wheat,40,800,3100.5\n\
                       2024-02-03,rice,,650,2900\n\
                       2024-03-04,maize,35,,3300.25\n";

    fn field() -> Conditions {
        Conditions {
            soil_ph: 6.5,
            soil_n: 40.0,
            soil_p: 25.0,
            rainfall_mm: 800.0,
            temp_avg: 24.0,
        }
    }

    #[test]
    fn dataset_parses_columns_and_rows() {
        let dataset = Dataset::from_csv("crops.csv", CSV.as_bytes()).unwrap();
        assert_eq!(dataset.columns.len(), 5);
        assert_eq!(dataset.rows.len(), 3);
        assert!(dataset.has_column("yield_kg_per_ha"));
    }

    #[test]
    fn summary_reports_missing_and_dtypes() {
        let summary = Dataset::from_csv("crops.csv", CSV.as_bytes()).unwrap().summary();
        assert_eq!(summary["shape"], json!([3, 5]));
        assert_eq!(summary["missing"]["soil_N"], 1);
        assert_eq!(summary["missing"]["crop_type"], 0);
        assert_eq!(summary["dtypes"]["crop_type"], "object");
        assert_eq!(summary["dtypes"]["soil_N"], "float64");
        assert_eq!(summary["dtypes"]["yield_kg_per_ha"], "float64");
        assert_eq!(summary["describe"]["soil_N"]["count"], 2.0);
        assert!(summary["describe"].get("crop_type").is_none());
    }

    #[test]
    fn integer_column_without_gaps_is_int64() {
        let dataset = Dataset::from_csv("a.csv", b"year\n2020\n2021\n").unwrap();
        assert_eq!(dataset.summary()["dtypes"]["year"], "int64");
    }

    #[test]
    fn plots_depend_on_columns() {
        let with_yield = Dataset::from_csv("crops.csv", CSV.as_bytes()).unwrap().plots();
        let names: Vec<&String> = with_yield.as_object().unwrap().keys().collect();
        assert_eq!(
            names,
            [
                "missing_values",
                "correlation_heatmap",
                "yield_distribution",
                "scatter_rainfall_yield",
                "boxplot_numeric",
                "pairplot",
                "outlier_percentages",
            ]
        );

        let bare = Dataset::from_csv("a.csv", b"x\n1\n").unwrap().plots();
        assert_eq!(bare.as_object().unwrap().len(), 5);
    }

    #[test]
    fn cost_and_env_formulas() {
        assert!((compute_cost(0.0, 0.0, 0.0) - 20.19).abs() < 1e-9);
        assert!((compute_env(100.0, 100.0, 100.0) - (60.055 + 30.009 + 4.946 + 6.73)).abs() < 1e-9);
    }

    #[test]
    fn optimizer_finds_interior_optimum() {
        let best = optimize_inputs(&field()).unwrap();
        assert_eq!(best.fertilizer_kg_per_ha, 250.0);
        assert_eq!(best.irrigation_mm, 250.0);
        assert_eq!(best.pesticide_ml, 170.0);
        assert!((best.input_cost_total - compute_cost(250.0, 250.0, 170.0)).abs() < 1e-9);
    }

    #[test]
    fn optimum_serializes_yield_key() {
        let json = serde_json::to_value(optimize_inputs(&field()).unwrap()).unwrap();
        assert!(json.get("yield").is_some());
        assert!(json.get("predicted_yield").is_none());
    }

    #[test]
    fn calendar_bounds() {
        assert!(check_calendar(6, 160, 2024).is_ok());
        assert!(check_calendar(13, 160, 2024).is_err());
        assert!(check_calendar(6, 0, 2024).is_err());
        assert!(check_calendar(6, 160, 1999).is_err());
    }
}
