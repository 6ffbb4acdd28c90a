//! `agripredict`: drive the AgriPredict service from a terminal.
//!
//! Each subcommand fills an in-memory page with the values given on the
//! command line, runs the matching dashboard operation, and prints what the
//! operation rendered.

mod output;
mod transport;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use agri_core::{
    ids, AgriClient, ApiError, Dashboard, MemoryView, MissingValueStrategy, Outcome, UploadFile,
    DEFAULT_BASE_URL,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::transport::UreqTransport;

#[derive(Parser, Debug)]
#[command(name = "agripredict")]
#[command(version, about = "Client for the AgriPredict crop-yield service", long_about = None)]
struct Cli {
    /// Origin of the AgriPredict API
    #[arg(long, global = true, env = "AGRI_API_BASE", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds; training and SHAP can be slow
    #[arg(long, global = true, env = "AGRI_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Log requests and responses at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a CSV dataset
    Upload {
        /// CSV file to send
        csv: PathBuf,
    },

    /// Print the EDA summary of the uploaded dataset
    EdaSummary,

    /// Fetch the EDA plots
    EdaPlots {
        /// Directory to write `<plot>.png` files into
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Fill missing values in the uploaded dataset
    Preprocess {
        /// mean, median or mode
        #[arg(long, default_value = "mean")]
        strategy: MissingValueStrategy,
    },

    /// Train the yield model
    Train {
        /// Target column
        #[arg(long, default_value = "yield_kg_per_ha")]
        target: String,

        /// Held-out fraction; the server default applies when omitted
        #[arg(long)]
        test_size: Option<f64>,
    },

    /// Predict yield for one set of conditions and inputs
    Predict(PredictArgs),

    /// Find the fertilizer, irrigation and pesticide levels with the best yield
    Optimize(FieldArgs),

    /// Fetch the SHAP summary plot
    ShapSummary {
        /// PNG file to write
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Fetch the SHAP feature-importance bar plot
    ShapBar {
        /// PNG file to write
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Field conditions shared by `predict` and `optimize`.
#[derive(Args, Debug)]
struct FieldArgs {
    #[arg(long = "soil-ph")]
    soil_ph: f64,
    #[arg(long = "soil-n")]
    soil_n: f64,
    #[arg(long = "soil-p")]
    soil_p: f64,
    #[arg(long)]
    rainfall_mm: f64,
    #[arg(long)]
    temp_avg: f64,
    #[arg(long)]
    month: u32,
    #[arg(long)]
    day_of_year: u32,
    #[arg(long)]
    year: i32,
    #[arg(long)]
    crop_type: String,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[command(flatten)]
    field: FieldArgs,
    #[arg(long)]
    fertilizer_kg_per_ha: f64,
    #[arg(long)]
    irrigation_mm: f64,
    #[arg(long)]
    pesticide_ml: f64,
    #[arg(long)]
    input_cost_total: f64,
    #[arg(long)]
    environmental_score: f64,
}

impl FieldArgs {
    fn fill(&self, view: MemoryView) -> MemoryView {
        view.with_value(ids::SOIL_PH, self.soil_ph.to_string())
            .with_value(ids::SOIL_N, self.soil_n.to_string())
            .with_value(ids::SOIL_P, self.soil_p.to_string())
            .with_value(ids::RAINFALL_MM, self.rainfall_mm.to_string())
            .with_value(ids::TEMP_AVG, self.temp_avg.to_string())
            .with_value(ids::MONTH, self.month.to_string())
            .with_value(ids::DAY_OF_YEAR, self.day_of_year.to_string())
            .with_value(ids::YEAR, self.year.to_string())
            .with_value(ids::CROP_TYPE, self.crop_type.as_str())
    }
}

impl PredictArgs {
    fn fill(&self, view: MemoryView) -> MemoryView {
        self.field
            .fill(view)
            .with_value(ids::FERTILIZER_KG_PER_HA, self.fertilizer_kg_per_ha.to_string())
            .with_value(ids::IRRIGATION_MM, self.irrigation_mm.to_string())
            .with_value(ids::PESTICIDE_ML, self.pesticide_ml.to_string())
            .with_value(ids::INPUT_COST_TOTAL, self.input_cost_total.to_string())
            .with_value(ids::ENVIRONMENTAL_SCORE, self.environmental_score.to_string())
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(base_url = %cli.base_url, timeout_secs = cli.timeout_secs, "starting");

    let transport = UreqTransport::new(Duration::from_secs(cli.timeout_secs));
    let dashboard = Dashboard::new(AgriClient::new(&cli.base_url), transport);
    run(&dashboard, cli.command)
}

fn run(dashboard: &Dashboard<UreqTransport>, command: Command) -> Result<()> {
    match command {
        Command::Upload { csv } => {
            let bytes = fs::read(&csv).with_context(|| format!("reading {}", csv.display()))?;
            let file_name = csv
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.csv".to_string());
            let mut view = MemoryView::new()
                .with_file(ids::FILE_INPUT, Some(UploadFile::csv(file_name, bytes)))
                .with_element(ids::UPLOAD_STATUS);
            let result = dashboard.upload_file(&mut view);
            report(&view, ids::UPLOAD_STATUS, result, "upload")
        }
        Command::EdaSummary => {
            let mut view = MemoryView::new().with_element(ids::SUMMARY_BOX);
            let result = dashboard.load_eda_summary(&mut view);
            report(&view, ids::SUMMARY_BOX, result, "EDA summary")
        }
        Command::EdaPlots { out } => {
            let mut view = MemoryView::new().with_element(ids::PLOTS_CONTAINER);
            dashboard
                .load_eda_plots(&mut view)
                .context("EDA plots failed")?;
            let images = view.images(ids::PLOTS_CONTAINER);
            match out {
                Some(dir) => output::save_plots(images, &dir)?,
                None => {
                    for image in images {
                        println!("{} ({} base64 chars)", image.alt, image.src.len());
                    }
                }
            }
            Ok(())
        }
        Command::Preprocess { strategy } => {
            let mut view = MemoryView::new()
                .with_value(ids::STRATEGY_SELECT, strategy.as_str())
                .with_element(ids::PREPROCESS_STATUS);
            let result = dashboard.run_preprocess(&mut view);
            report(&view, ids::PREPROCESS_STATUS, result, "preprocessing")
        }
        Command::Train { target, test_size } => {
            let mut view = MemoryView::new()
                .with_value(ids::TARGET_INPUT, target)
                .with_value(
                    ids::TEST_SIZE_INPUT,
                    test_size.map(|t| t.to_string()).unwrap_or_default(),
                )
                .with_element(ids::TRAIN_STATUS);
            let result = dashboard.train_model(&mut view);
            report(&view, ids::TRAIN_STATUS, result, "training")
        }
        Command::Predict(args) => {
            let mut view = args.fill(MemoryView::new().with_element(ids::PREDICTION_RESULT));
            let result = dashboard.predict_yield(&mut view);
            report(&view, ids::PREDICTION_RESULT, result, "prediction")
        }
        Command::Optimize(args) => {
            let mut view = args.fill(MemoryView::new().with_element(ids::OPTIMIZE_RESULT));
            let result = dashboard.optimize_inputs(&mut view);
            report(&view, ids::OPTIMIZE_RESULT, result, "optimization")
        }
        Command::ShapSummary { out } => {
            let mut view = MemoryView::new().with_element(ids::SHAP_SUMMARY_IMG);
            dashboard
                .load_shap_summary(&mut view)
                .context("SHAP summary failed")?;
            write_image(&view, ids::SHAP_SUMMARY_IMG, out)
        }
        Command::ShapBar { out } => {
            let mut view = MemoryView::new().with_element(ids::SHAP_BAR_IMG);
            dashboard
                .load_shap_bar(&mut view)
                .context("SHAP bar plot failed")?;
            write_image(&view, ids::SHAP_BAR_IMG, out)
        }
    }
}

/// Print the status element, then turn a failed operation into an error.
fn report(
    view: &MemoryView,
    id: &str,
    result: Result<Outcome, ApiError>,
    what: &str,
) -> Result<()> {
    let text = output::terminal_text(view.content(id).unwrap_or_default());
    match result {
        Ok(Outcome::Rendered) => {
            println!("{text}");
            Ok(())
        }
        Ok(Outcome::Skipped) => bail!("{what} was skipped"),
        Err(err) => {
            if !text.is_empty() {
                eprintln!("{text}");
            }
            Err(err).with_context(|| format!("{what} failed"))
        }
    }
}

fn write_image(view: &MemoryView, id: &str, out: Option<PathBuf>) -> Result<()> {
    let src = view.image_src(id).unwrap_or_default();
    match out {
        Some(path) => {
            let written = output::save_data_uri(src, &path)?;
            println!("saved {} ({written} bytes)", path.display());
        }
        None => println!("{src}"),
    }
    Ok(())
}
