//! Synchronous API client core for the AgriPredict analytics service.
//!
//! # Overview
//! `AgriClient` turns each endpoint into a pair of pure functions: a
//! `build_*` that yields an `HttpRequest` and a `parse_*` that reads the
//! `HttpResponse`. The host performs the round-trip through a `Transport`.
//! `Dashboard` sits on top and runs the page operations against a `View`.
//!
//! # Design
//! - The client keeps nothing but its base URL.
//! - A 2xx body shaped like `{"error": ..}` is a failure, not a result.
//! - DTOs do not depend on the mock-server crate. The live-server tests
//!   catch any drift between the two.

pub mod client;
pub mod dashboard;
pub mod error;
pub mod http;
mod multipart;
pub mod render;
pub mod transport;
pub mod types;
pub mod view;

pub use client::{AgriClient, DEFAULT_BASE_URL};
pub use dashboard::{Dashboard, Outcome};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::Transport;
pub use types::{
    EdaPlots, ImageData, MissingValueStrategy, OptimizeInput, OptimizedInputs, Prediction,
    PredictionInput, PreprocessOutcome, ShapImage, TrainMetrics, TrainRequest, UploadFile,
    UploadReceipt,
};
pub use view::{ids, Image, MemoryView, StatusColor, View};
