//! View binding between dashboard operations and whatever renders them.
//!
//! # Design
//! Operations never reach for a concrete UI. They look elements up by id
//! through `View`, which keeps the request/response logic testable without
//! a browser. `MemoryView` is the in-memory implementation used by tests and
//! by the command-line host. Writes to an element that does not exist are
//! ignored.

use std::collections::HashMap;
use std::fmt;

use crate::types::UploadFile;

/// Element ids of the AgriPredict pages.
pub mod ids {
    pub const FILE_INPUT: &str = "fileInput";
    pub const UPLOAD_STATUS: &str = "uploadStatus";
    pub const SUMMARY_BOX: &str = "summaryBox";
    pub const PLOTS_CONTAINER: &str = "plotsContainer";
    pub const STRATEGY_SELECT: &str = "strategySelect";
    pub const PREPROCESS_STATUS: &str = "preprocessStatus";
    pub const TARGET_INPUT: &str = "targetInput";
    pub const TEST_SIZE_INPUT: &str = "testSizeInput";
    pub const TRAIN_STATUS: &str = "trainStatus";
    pub const PREDICTION_RESULT: &str = "predictionResult";
    pub const OPTIMIZE_RESULT: &str = "optimizeResult";
    pub const SHAP_SUMMARY_IMG: &str = "summary-img";
    pub const SHAP_BAR_IMG: &str = "bar-img";

    // Feature inputs shared by the prediction and optimization forms.
    pub const SOIL_PH: &str = "soil_pH";
    pub const SOIL_N: &str = "soil_N";
    pub const SOIL_P: &str = "soil_P";
    pub const RAINFALL_MM: &str = "rainfall_mm";
    pub const TEMP_AVG: &str = "temp_avg";
    pub const FERTILIZER_KG_PER_HA: &str = "fertilizer_kg_per_ha";
    pub const IRRIGATION_MM: &str = "irrigation_mm";
    pub const PESTICIDE_ML: &str = "pesticide_ml";
    pub const MONTH: &str = "month";
    pub const DAY_OF_YEAR: &str = "day_of_year";
    pub const YEAR: &str = "year";
    pub const INPUT_COST_TOTAL: &str = "input_cost_total";
    pub const ENVIRONMENTAL_SCORE: &str = "environmental_score";
    pub const CROP_TYPE: &str = "crop_type";
}

/// Colour of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Green,
    Red,
}

impl StatusColor {
    pub fn as_css(self) -> &'static str {
        match self {
            StatusColor::Green => "green",
            StatusColor::Red => "red",
        }
    }
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_css())
    }
}

/// An `<img>` appended to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub src: String,
    pub alt: String,
    pub class: String,
}

/// Element lookup and mutation, keyed by element id.
pub trait View {
    fn contains(&self, id: &str) -> bool;

    /// Current value of an input element. `None` if the element is absent.
    fn value(&self, id: &str) -> Option<String>;

    /// The file selected in a file input, if any.
    fn file(&self, id: &str) -> Option<UploadFile>;

    /// Replace the element's content with plain text.
    fn set_text(&mut self, id: &str, text: &str);

    /// Replace the element's content with markup.
    fn set_html(&mut self, id: &str, html: &str);

    fn set_color(&mut self, id: &str, color: StatusColor);

    /// Remove all content and children.
    fn clear(&mut self, id: &str);

    fn append_image(&mut self, id: &str, image: Image);

    fn set_image_src(&mut self, id: &str, src: &str);

    fn set_image_alt(&mut self, id: &str, alt: &str);
}

/// How an element's content was last written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentKind {
    #[default]
    Text,
    Html,
}

/// State of one element in a `MemoryView`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub value: Option<String>,
    pub file: Option<UploadFile>,
    pub content: String,
    pub kind: ContentKind,
    pub color: Option<StatusColor>,
    pub children: Vec<Image>,
    pub src: String,
    pub alt: String,
}

/// A page held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryView {
    elements: HashMap<String, Element>,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty element.
    pub fn with_element(mut self, id: &str) -> Self {
        self.elements.entry(id.to_string()).or_default();
        self
    }

    /// Add an input element holding `value`.
    pub fn with_value(mut self, id: &str, value: impl Into<String>) -> Self {
        self.elements.entry(id.to_string()).or_default().value = Some(value.into());
        self
    }

    /// Add a file input. `None` models an input with nothing selected.
    pub fn with_file(mut self, id: &str, file: Option<UploadFile>) -> Self {
        self.elements.entry(id.to_string()).or_default().file = file;
        self
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn content(&self, id: &str) -> Option<&str> {
        self.element(id).map(|e| e.content.as_str())
    }

    pub fn color(&self, id: &str) -> Option<StatusColor> {
        self.element(id).and_then(|e| e.color)
    }

    pub fn images(&self, id: &str) -> &[Image] {
        self.element(id).map(|e| e.children.as_slice()).unwrap_or_default()
    }

    pub fn image_src(&self, id: &str) -> Option<&str> {
        self.element(id).map(|e| e.src.as_str())
    }

    fn write(&mut self, id: &str, content: &str, kind: ContentKind) {
        if let Some(element) = self.elements.get_mut(id) {
            element.content = content.to_string();
            element.kind = kind;
            element.children.clear();
        }
    }
}

impl View for MemoryView {
    fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    fn value(&self, id: &str) -> Option<String> {
        self.elements.get(id).and_then(|e| e.value.clone())
    }

    fn file(&self, id: &str) -> Option<UploadFile> {
        self.elements.get(id).and_then(|e| e.file.clone())
    }

    fn set_text(&mut self, id: &str, text: &str) {
        self.write(id, text, ContentKind::Text);
    }

    fn set_html(&mut self, id: &str, html: &str) {
        self.write(id, html, ContentKind::Html);
    }

    fn set_color(&mut self, id: &str, color: StatusColor) {
        if let Some(element) = self.elements.get_mut(id) {
            element.color = Some(color);
        }
    }

    fn clear(&mut self, id: &str) {
        self.write(id, "", ContentKind::Html);
    }

    fn append_image(&mut self, id: &str, image: Image) {
        if let Some(element) = self.elements.get_mut(id) {
            element.children.push(image);
        }
    }

    fn set_image_src(&mut self, id: &str, src: &str) {
        if let Some(element) = self.elements.get_mut(id) {
            element.src = src.to_string();
        }
    }

    fn set_image_alt(&mut self, id: &str, alt: &str) {
        if let Some(element) = self.elements.get_mut(id) {
            element.alt = alt.to_string();
        }
    }
}
