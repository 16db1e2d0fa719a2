//! Application state and its reducer.
//!
//! Every change to [`AppState`] goes through [`AppState::reduce`] with an
//! [`Action`]. The state never calls out to the adapter itself; the
//! [`crate::session::Session`] controller does the I/O and feeds the results
//! back in as actions.

use crate::catalog::{Catalog, CatalogSummary, ChatMessage, ChatRole, DetectionResult};
use crate::chat::chat_error_text;
use crate::config::OcrQuality;
use crate::view::{self, DerivedView, SortOption, ViewQuery};
use tracing::debug;

/// Progress of a running extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingState {
    pub stage: String,
    pub current: usize,
    pub total: usize,
}

/// Everything a front end needs to draw the extraction workflow.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    /// The aggregate of the last successful run.
    pub catalog: Option<Catalog>,
    pub view: ViewQuery,
    pub chat: Vec<ChatMessage>,
    /// A chat reply is being received.
    pub chat_pending: bool,
    pub chat_error: Option<String>,
    pub detection: Option<Vec<DetectionResult>>,
    pub detecting: bool,
    /// Message of the last failed run or detection.
    pub error: Option<String>,
    /// `Some` while an extraction run is active.
    pub loading: Option<LoadingState>,
    pub ocr_quality: OcrQuality,
}

/// A state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RunStarted { total: usize },
    RunProgress { stage: String, current: usize, total: usize },
    RunSucceeded(Catalog),
    RunFailed(String),
    DetectionStarted,
    DetectionFinished(Vec<DetectionResult>),
    DetectionFailed(String),
    ToggleCategory(String),
    ClearCategories,
    SetSearch(String),
    SetSort(SortOption),
    ResetView,
    ChatSubmitted(String),
    ChatChunk(String),
    ChatFailed(String),
    ChatFinished,
    SetOcrQuality(OcrQuality),
}

impl AppState {
    pub fn new(ocr_quality: OcrQuality) -> Self {
        Self {
            ocr_quality,
            ..Default::default()
        }
    }

    /// Apply `action`. This is the only way the state changes.
    pub fn reduce(&mut self, action: Action) {
        debug!("reduce: {:?}", ActionName(&action));
        match action {
            Action::RunStarted { total } => {
                self.catalog = None;
                self.detection = None;
                self.error = None;
                self.chat.clear();
                self.chat_error = None;
                self.view = ViewQuery::default();
                self.loading = Some(LoadingState {
                    stage: "Preparing inputs...".into(),
                    current: 0,
                    total,
                });
            }
            Action::RunProgress {
                stage,
                current,
                total,
            } => {
                self.loading = Some(LoadingState {
                    stage,
                    current,
                    total,
                });
            }
            Action::RunSucceeded(catalog) => {
                self.catalog = Some(catalog);
                self.loading = None;
            }
            Action::RunFailed(message) => {
                self.error = Some(message);
                self.loading = None;
            }
            Action::DetectionStarted => {
                self.detecting = true;
                self.detection = None;
                self.error = None;
            }
            Action::DetectionFinished(results) => {
                self.detection = Some(results);
                self.detecting = false;
            }
            Action::DetectionFailed(message) => {
                self.error = Some(message);
                self.detecting = false;
            }
            Action::ToggleCategory(name) => {
                if !self.view.selected_categories.remove(&name) {
                    self.view.selected_categories.insert(name);
                }
            }
            Action::ClearCategories => self.view.selected_categories.clear(),
            Action::SetSearch(search) => self.view.search = search,
            Action::SetSort(sort) => self.view.sort = sort,
            Action::ResetView => self.view = ViewQuery::default(),
            Action::ChatSubmitted(message) => {
                if message.trim().is_empty() || self.catalog.is_none() {
                    return;
                }
                self.chat.push(ChatMessage::user(message));
                self.chat.push(ChatMessage::model(""));
                self.chat_pending = true;
                self.chat_error = None;
            }
            Action::ChatChunk(chunk) => {
                if let Some(last) = self.chat.last_mut().filter(|m| m.role == ChatRole::Model) {
                    last.text.push_str(&chunk);
                }
            }
            Action::ChatFailed(message) => {
                let text = chat_error_text(&message);
                match self.chat.last_mut() {
                    Some(last) if last.role == ChatRole::Model && last.text.is_empty() => {
                        last.text = text;
                    }
                    _ => self.chat.push(ChatMessage::model(text)),
                }
                self.chat_error = Some(message);
            }
            Action::ChatFinished => self.chat_pending = false,
            Action::SetOcrQuality(quality) => self.ocr_quality = quality,
        }
    }

    /// The filtered, searched and sorted view of the current catalog.
    pub fn derived(&self) -> Option<DerivedView> {
        self.catalog
            .as_ref()
            .map(|catalog| view::derive(catalog, &self.view))
    }

    /// Counts of the derived view.
    pub fn summary(&self) -> Option<CatalogSummary> {
        self.derived().map(|v| v.summary)
    }

    /// All category names of the current catalog, for the filter list.
    pub fn category_names(&self) -> Vec<String> {
        self.catalog
            .as_ref()
            .map(view::category_names)
            .unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }
}

/// Logs the variant name only; payloads such as whole catalogs stay out of
/// debug output.
struct ActionName<'a>(&'a Action);

impl std::fmt::Debug for ActionName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.0 {
            Action::RunStarted { .. } => "RunStarted",
            Action::RunProgress { .. } => "RunProgress",
            Action::RunSucceeded(_) => "RunSucceeded",
            Action::RunFailed(_) => "RunFailed",
            Action::DetectionStarted => "DetectionStarted",
            Action::DetectionFinished(_) => "DetectionFinished",
            Action::DetectionFailed(_) => "DetectionFailed",
            Action::ToggleCategory(_) => "ToggleCategory",
            Action::ClearCategories => "ClearCategories",
            Action::SetSearch(_) => "SetSearch",
            Action::SetSort(_) => "SetSort",
            Action::ResetView => "ResetView",
            Action::ChatSubmitted(_) => "ChatSubmitted",
            Action::ChatChunk(_) => "ChatChunk",
            Action::ChatFailed(_) => "ChatFailed",
            Action::ChatFinished => "ChatFinished",
            Action::SetOcrQuality(_) => "SetOcrQuality",
        };
        f.write_str(name)
    }
}
