//! Status texts written into the page.

use crate::types::{OptimizedInputs, PreprocessOutcome, Prediction, TrainMetrics};

pub const SELECT_CSV: &str = "Please select a CSV file.";
pub const UPLOADING: &str = "Uploading...";
pub const UPLOAD_OK: &str = "Upload successful!";
pub const UPLOAD_FAILED: &str = "Upload failed!";

pub const LOADING: &str = "Loading...";
pub const LOADING_PLOTS: &str = "Loading plots...";
pub const PLOT_CLASS: &str = "plot-img";

pub const PROCESSING: &str = "Processing...";
pub const PREPROCESS_FAILED: &str = "Preprocessing failed!";

pub const TRAINING: &str = "Training model...";
pub const TRAIN_FAILED: &str = "Training failed!";

pub const PREDICTING: &str = "Predicting...";
pub const PREDICT_FAILED: &str = "Prediction failed!";

pub const OPTIMIZING: &str = "Optimizing...";
pub const OPTIMIZE_FAILED: &str = "Optimization failed!";

pub fn preprocess_complete(outcome: &PreprocessOutcome) -> String {
    format!("Preprocessing complete!<br>Saved File: {}", outcome.output_file)
}

pub fn model_trained(metrics: &TrainMetrics) -> String {
    format!("Model trained!<br>R² Score: {:.4}", metrics.r2_score)
}

pub fn predicted_yield(prediction: &Prediction) -> String {
    format!("Predicted Yield: <b>{:.2}</b> kg/ha", prediction.prediction)
}

/// Fertilizer, irrigation and pesticide are grid values and print as-is.
pub fn optimal_inputs(best: &OptimizedInputs) -> String {
    format!(
        "Optimal Inputs:\n\
         -------------------------\n\
         Fertilizer: {} kg/ha\n\
         Irrigation: {} mm\n\
         Pesticide: {} ml\n\
         \n\
         Predicted Yield: {:.2} kg/ha\n\
         Cost: {:.2} INR\n\
         Environmental Score: {:.2}",
        best.fertilizer_kg_per_ha,
        best.irrigation_mm,
        best.pesticide_ml,
        best.predicted_yield,
        best.input_cost_total,
        best.environmental_score,
    )
}

pub fn invalid_input(field: &str) -> String {
    format!("Invalid value for {field}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r2_has_four_decimals() {
        assert_eq!(
            model_trained(&TrainMetrics { r2_score: 0.876_54 }),
            "Model trained!<br>R² Score: 0.8765"
        );
    }

    #[test]
    fn optimal_inputs_block() {
        let block = optimal_inputs(&OptimizedInputs {
            fertilizer_kg_per_ha: 250.0,
            irrigation_mm: 240.0,
            pesticide_ml: 170.5,
            predicted_yield: 4321.987,
            input_cost_total: 245.111,
            environmental_score: 240.666,
        });
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "Optimal Inputs:");
        assert_eq!(lines[2], "Fertilizer: 250 kg/ha");
        assert_eq!(lines[3], "Irrigation: 240 mm");
        assert_eq!(lines[4], "Pesticide: 170.5 ml");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "Predicted Yield: 4321.99 kg/ha");
        assert_eq!(lines[7], "Cost: 245.11 INR");
        assert_eq!(lines[8], "Environmental Score: 240.67");
    }
}
