//! The nine page operations: read the view, make one call, write the view.
//!
//! # Design
//! Every operation first checks that the elements it needs exist and returns
//! `Outcome::Skipped` without touching the transport when they do not, so
//! the same dashboard can drive pages that only carry some widgets. Input
//! values are validated before anything is sent. Operations that own a
//! status element render their failure text there; the loaders (EDA, SHAP)
//! have none and leave their loading placeholder in place.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::AgriClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::render;
use crate::transport::Transport;
use crate::types::{MissingValueStrategy, OptimizeInput, PredictionInput, TrainRequest};
use crate::view::{ids, Image, StatusColor, View};

/// What an operation did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The response was rendered.
    Rendered,
    /// A required element was absent; nothing was sent or written.
    Skipped,
}

/// Drives `AgriClient` against a `Transport` and renders into a `View`.
#[derive(Debug, Clone)]
pub struct Dashboard<T> {
    client: AgriClient,
    transport: T,
}

impl<T: Transport> Dashboard<T> {
    pub fn new(client: AgriClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &AgriClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn upload_file<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        let status = ids::UPLOAD_STATUS;
        if !view.contains(status) {
            return Ok(skipped("upload_file", status));
        }
        let Some(file) = view.file(ids::FILE_INPUT) else {
            view.set_html(status, render::SELECT_CSV);
            view.set_color(status, StatusColor::Red);
            warn!("upload requested without a selected file");
            return Err(ApiError::invalid(ids::FILE_INPUT, None));
        };

        view.set_text(status, render::UPLOADING);
        let request = self.client.build_upload(&file);
        match self
            .exchange(&request)
            .and_then(|response| self.client.parse_upload(response))
        {
            Ok(receipt) => {
                info!(file = %file.file_name, path = ?receipt.file_path, "upload succeeded");
                view.set_text(status, render::UPLOAD_OK);
                view.set_color(status, StatusColor::Green);
                Ok(Outcome::Rendered)
            }
            Err(err) => fail(view, status, render::UPLOAD_FAILED, "upload_file", err),
        }
    }

    pub fn load_eda_summary<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        let target = ids::SUMMARY_BOX;
        if !view.contains(target) {
            return Ok(skipped("load_eda_summary", target));
        }

        view.set_text(target, render::LOADING);
        let summary = self
            .exchange(&self.client.build_eda_summary())
            .and_then(|response| self.client.parse_eda_summary(response))
            .map_err(|err| unrendered("load_eda_summary", err))?;

        view.set_text(target, &pretty_summary(&summary));
        info!("EDA summary loaded");
        Ok(Outcome::Rendered)
    }

    pub fn load_eda_plots<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        let container = ids::PLOTS_CONTAINER;
        if !view.contains(container) {
            return Ok(skipped("load_eda_plots", container));
        }

        view.set_text(container, render::LOADING_PLOTS);
        let plots = self
            .exchange(&self.client.build_eda_plots())
            .and_then(|response| self.client.parse_eda_plots(response))
            .map_err(|err| unrendered("load_eda_plots", err))?;

        view.clear(container);
        for (name, image) in &plots.plots {
            debug!(plot = %name, "appending plot");
            view.append_image(
                container,
                Image {
                    src: image.data_uri(),
                    alt: name.clone(),
                    class: render::PLOT_CLASS.to_string(),
                },
            );
        }
        info!(count = plots.len(), "EDA plots loaded");
        Ok(Outcome::Rendered)
    }

    pub fn run_preprocess<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        let status = ids::PREPROCESS_STATUS;
        let raw = non_empty(view.value(ids::STRATEGY_SELECT));
        let Some(raw) = raw.filter(|_| view.contains(status)) else {
            return Ok(skipped("run_preprocess", status));
        };
        let strategy: MissingValueStrategy = match raw.parse() {
            Ok(strategy) => strategy,
            Err(err) => return reject(view, status, ids::STRATEGY_SELECT, err),
        };

        view.set_text(status, render::PROCESSING);
        let request = self.client.build_preprocess(strategy);
        match self
            .exchange(&request)
            .and_then(|response| self.client.parse_preprocess(response))
        {
            Ok(outcome) => {
                info!(%strategy, file = %outcome.output_file, "preprocessing complete");
                view.set_html(status, &render::preprocess_complete(&outcome));
                view.set_color(status, StatusColor::Green);
                Ok(Outcome::Rendered)
            }
            Err(err) => fail(view, status, render::PREPROCESS_FAILED, "run_preprocess", err),
        }
    }

    pub fn train_model<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        let status = ids::TRAIN_STATUS;
        let target = non_empty(view.value(ids::TARGET_INPUT));
        let Some(target) = target.filter(|_| view.contains(status)) else {
            return Ok(skipped("train_model", status));
        };
        let test_size = match non_empty(view.value(ids::TEST_SIZE_INPUT)) {
            None => None,
            Some(raw) => match parse_finite(ids::TEST_SIZE_INPUT, raw) {
                Ok(value) => Some(value),
                Err(err) => return reject(view, status, ids::TEST_SIZE_INPUT, err),
            },
        };

        view.set_text(status, render::TRAINING);
        let request = self.client.build_train(&TrainRequest { target, test_size });
        match self
            .exchange(&request)
            .and_then(|response| self.client.parse_train(response))
        {
            Ok(metrics) => {
                info!(r2 = metrics.r2_score, "model trained");
                view.set_html(status, &render::model_trained(&metrics));
                view.set_color(status, StatusColor::Green);
                Ok(Outcome::Rendered)
            }
            Err(err) => fail(view, status, render::TRAIN_FAILED, "train_model", err),
        }
    }

    pub fn predict_yield<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        let status = ids::PREDICTION_RESULT;
        if !view.contains(status) {
            return Ok(skipped("predict_yield", status));
        }
        let input = match read_prediction_input(view) {
            Ok(input) => input,
            Err(err) => return reject_input(view, status, err),
        };

        view.set_text(status, render::PREDICTING);
        match self
            .client
            .build_predict(&input)
            .and_then(|request| self.exchange(&request))
            .and_then(|response| self.client.parse_predict(response))
        {
            Ok(prediction) => {
                info!(prediction = prediction.prediction, "yield predicted");
                view.set_html(status, &render::predicted_yield(&prediction));
                view.set_color(status, StatusColor::Green);
                Ok(Outcome::Rendered)
            }
            Err(err) => fail(view, status, render::PREDICT_FAILED, "predict_yield", err),
        }
    }

    /// A successful optimization leaves the box colour untouched.
    pub fn optimize_inputs<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        let target = ids::OPTIMIZE_RESULT;
        if !view.contains(target) {
            return Ok(skipped("optimize_inputs", target));
        }
        let input = match read_optimize_input(view) {
            Ok(input) => input,
            Err(err) => return reject_input(view, target, err),
        };

        view.set_text(target, render::OPTIMIZING);
        match self
            .client
            .build_optimize(&input)
            .and_then(|request| self.exchange(&request))
            .and_then(|response| self.client.parse_optimize(response))
        {
            Ok(best) => {
                info!(
                    fertilizer = best.fertilizer_kg_per_ha,
                    irrigation = best.irrigation_mm,
                    pesticide = best.pesticide_ml,
                    predicted_yield = best.predicted_yield,
                    "inputs optimized"
                );
                view.set_html(target, &render::optimal_inputs(&best));
                Ok(Outcome::Rendered)
            }
            Err(err) => fail(view, target, render::OPTIMIZE_FAILED, "optimize_inputs", err),
        }
    }

    pub fn load_shap_summary<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        self.load_shap(view, ids::SHAP_SUMMARY_IMG, self.client.build_shap_summary())
    }

    pub fn load_shap_bar<V: View>(&self, view: &mut V) -> Result<Outcome, ApiError> {
        self.load_shap(view, ids::SHAP_BAR_IMG, self.client.build_shap_bar())
    }

    fn load_shap<V: View>(
        &self,
        view: &mut V,
        image_id: &str,
        request: HttpRequest,
    ) -> Result<Outcome, ApiError> {
        if !view.contains(image_id) {
            return Ok(skipped("load_shap", image_id));
        }

        view.set_image_src(image_id, "");
        view.set_image_alt(image_id, render::LOADING);
        let shap = self
            .exchange(&request)
            .and_then(|response| self.client.parse_shap(response))
            .map_err(|err| unrendered("load_shap", err))?;

        view.set_image_src(image_id, &shap.image.data_uri());
        info!(element = image_id, "SHAP plot loaded");
        Ok(Outcome::Rendered)
    }

    fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.transport.execute(request)?;
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            status = response.status,
            "response received"
        );
        Ok(response)
    }
}

fn skipped(operation: &str, id: &str) -> Outcome {
    warn!(operation, element = id, "required element missing, skipping");
    Outcome::Skipped
}

fn fail<V: View>(
    view: &mut V,
    id: &str,
    message: &str,
    operation: &str,
    err: ApiError,
) -> Result<Outcome, ApiError> {
    warn!(operation, error = %err, "operation failed");
    view.set_text(id, message);
    view.set_color(id, StatusColor::Red);
    Err(err)
}

fn unrendered(operation: &str, err: ApiError) -> ApiError {
    warn!(operation, error = %err, "operation failed");
    err
}

fn reject<V: View>(
    view: &mut V,
    id: &str,
    field: &str,
    err: ApiError,
) -> Result<Outcome, ApiError> {
    warn!(field, error = %err, "rejected input");
    view.set_text(id, &render::invalid_input(field));
    view.set_color(id, StatusColor::Red);
    Err(err)
}

fn reject_input<V: View>(view: &mut V, id: &str, err: ApiError) -> Result<Outcome, ApiError> {
    let field = match &err {
        ApiError::InvalidInput { field, .. } => field.clone(),
        _ => String::from("input"),
    };
    reject(view, id, &field, err)
}

/// Blank counts as empty: a whitespace-only target or strategy is never sent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_finite(field: &str, raw: String) -> Result<f64, ApiError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ApiError::invalid(field, Some(raw))),
    }
}

fn read_f64<V: View>(view: &V, field: &str) -> Result<f64, ApiError> {
    match view.value(field) {
        Some(raw) => parse_finite(field, raw),
        None => Err(ApiError::invalid(field, None)),
    }
}

fn read_int<N: std::str::FromStr, V: View>(view: &V, field: &str) -> Result<N, ApiError> {
    let raw = view.value(field);
    raw.as_deref()
        .and_then(|v| v.trim().parse::<N>().ok())
        .ok_or_else(|| ApiError::invalid(field, raw))
}

fn read_text<V: View>(view: &V, field: &str) -> Result<String, ApiError> {
    non_empty(view.value(field))
        .map(|v| v.trim().to_string())
        .ok_or_else(|| ApiError::invalid(field, view.value(field)))
}

fn read_prediction_input<V: View>(view: &V) -> Result<PredictionInput, ApiError> {
    Ok(PredictionInput {
        soil_ph: read_f64(view, ids::SOIL_PH)?,
        soil_n: read_f64(view, ids::SOIL_N)?,
        soil_p: read_f64(view, ids::SOIL_P)?,
        rainfall_mm: read_f64(view, ids::RAINFALL_MM)?,
        temp_avg: read_f64(view, ids::TEMP_AVG)?,
        fertilizer_kg_per_ha: read_f64(view, ids::FERTILIZER_KG_PER_HA)?,
        irrigation_mm: read_f64(view, ids::IRRIGATION_MM)?,
        pesticide_ml: read_f64(view, ids::PESTICIDE_ML)?,
        month: read_int(view, ids::MONTH)?,
        day_of_year: read_int(view, ids::DAY_OF_YEAR)?,
        year: read_int(view, ids::YEAR)?,
        input_cost_total: read_f64(view, ids::INPUT_COST_TOTAL)?,
        environmental_score: read_f64(view, ids::ENVIRONMENTAL_SCORE)?,
        crop_type: read_text(view, ids::CROP_TYPE)?,
    })
}

fn read_optimize_input<V: View>(view: &V) -> Result<OptimizeInput, ApiError> {
    Ok(OptimizeInput {
        soil_ph: read_f64(view, ids::SOIL_PH)?,
        soil_n: read_f64(view, ids::SOIL_N)?,
        soil_p: read_f64(view, ids::SOIL_P)?,
        rainfall_mm: read_f64(view, ids::RAINFALL_MM)?,
        temp_avg: read_f64(view, ids::TEMP_AVG)?,
        month: read_int(view, ids::MONTH)?,
        day_of_year: read_int(view, ids::DAY_OF_YEAR)?,
        year: read_int(view, ids::YEAR)?,
        crop_type: read_text(view, ids::CROP_TYPE)?,
    })
}

/// Pretty-print a summary the way it is rendered, two-space indented.
pub fn pretty_summary(summary: &Value) -> String {
    serde_json::to_string_pretty(summary).unwrap_or_else(|_| summary.to_string())
}
