//! The session controller: owns the [`AppState`], the adapter and the
//! configuration, and turns user intents into adapter calls and reducer
//! actions.
//!
//! Long operations give control back between steps. An extraction run
//! dispatches progress before every input, and a chat reply is pulled one
//! fragment at a time with [`Session::pump_chat`], so a front end can redraw
//! between fragments or cancel the reply.

use crate::adapter::ExtractionAdapter;
use crate::catalog::{DetectionResult, ScrapeInput};
use crate::chat::{self, ChatCancelHandle, ChatSubscription};
use crate::config::{ExtractionConfig, OcrQuality};
use crate::error::CatalogError;
use crate::export::{self, ExportFile, ExportFormat};
use crate::extract::{self, ExtractionRun, RunOutput};
use crate::pipeline::input::validate_inputs;
use crate::prefs::PreferenceStore;
use crate::state::{Action, AppState};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

/// Which catalog an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    /// The whole aggregate.
    #[default]
    Catalog,
    /// Only what the current filters, search and sort show.
    View,
}

/// What one [`Session::pump_chat`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPump {
    /// A fragment was appended to the reply.
    Chunk(String),
    /// The reply failed; the error is now an inline model message.
    Failed(String),
    /// The reply is complete, was cancelled, or no reply was pending.
    Done,
}

pub struct Session {
    state: AppState,
    adapter: Arc<dyn ExtractionAdapter>,
    config: ExtractionConfig,
    prefs: Option<PreferenceStore>,
    chat: Option<ChatSubscription>,
}

impl Session {
    pub fn new(adapter: Arc<dyn ExtractionAdapter>, config: ExtractionConfig) -> Self {
        Self {
            state: AppState::new(config.ocr_quality),
            adapter,
            config,
            prefs: None,
            chat: None,
        }
    }

    /// Attach a preference store and adopt its stored OCR quality.
    pub fn with_preferences(mut self, prefs: PreferenceStore) -> Self {
        let quality = prefs.load_ocr_quality();
        self.config.ocr_quality = quality;
        self.state.reduce(Action::SetOcrQuality(quality));
        self.prefs = Some(prefs);
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Apply a view or state action directly (filters, search, sort…).
    pub fn dispatch(&mut self, action: Action) {
        self.state.reduce(action);
    }

    /// Run an extraction over `inputs` and make its catalog current.
    ///
    /// Inputs are validated before anything changes; an invalid input
    /// leaves the session as it was. Otherwise the previous catalog,
    /// detection results, chat and view are cleared first. On failure the
    /// error message is also recorded in the state.
    pub async fn scrape(&mut self, inputs: &[ScrapeInput]) -> Result<RunOutput, CatalogError> {
        validate_inputs(inputs)?;
        self.cancel_chat();
        self.chat = None;
        self.state.reduce(Action::RunStarted {
            total: inputs.len(),
        });

        let adapter = Arc::clone(&self.adapter);
        let config = self.config.clone();
        let result = self.drive_run(adapter.as_ref(), inputs, &config).await;

        match &result {
            Ok(output) => self.state.reduce(Action::RunSucceeded(output.catalog.clone())),
            Err(e) => self.state.reduce(Action::RunFailed(e.to_string())),
        }
        result
    }

    async fn drive_run(
        &mut self,
        adapter: &dyn ExtractionAdapter,
        inputs: &[ScrapeInput],
        config: &ExtractionConfig,
    ) -> Result<RunOutput, CatalogError> {
        let mut run = ExtractionRun::start(inputs, config)?;
        while let Some(stage) = run.next_stage() {
            self.state.reduce(Action::RunProgress {
                stage,
                current: run.completed(),
                total: run.total(),
            });
            run.step(adapter).await;
        }
        self.state.reduce(Action::RunProgress {
            stage: "Finalizing data...".into(),
            current: run.total(),
            total: run.total(),
        });
        run.finish()
    }

    /// Run the catalog pre-check over `inputs`.
    pub async fn detect(&mut self, inputs: &[ScrapeInput]) -> Result<Vec<DetectionResult>, CatalogError> {
        self.state.reduce(Action::DetectionStarted);
        let adapter = Arc::clone(&self.adapter);
        match extract::detect_products(adapter.as_ref(), inputs).await {
            Ok(results) => {
                self.state.reduce(Action::DetectionFinished(results.clone()));
                Ok(results)
            }
            Err(e) => {
                self.state.reduce(Action::DetectionFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Ask a question about the current catalog.
    ///
    /// The user message and an empty model placeholder are appended to the
    /// chat log; fragments then arrive through [`Session::pump_chat`]. Any
    /// reply still streaming is cancelled first.
    ///
    /// # Errors
    /// [`CatalogError::ChatUnavailable`] when the message is blank or no
    /// catalog has been extracted.
    pub async fn start_chat(&mut self, message: &str) -> Result<ChatCancelHandle, CatalogError> {
        if message.trim().is_empty() {
            return Err(CatalogError::ChatUnavailable("the message is empty".into()));
        }
        let catalog = self
            .state
            .catalog
            .clone()
            .ok_or_else(|| CatalogError::ChatUnavailable("no catalog has been extracted yet".into()))?;

        if self.chat.is_some() {
            self.cancel_chat();
            self.finish_chat();
        }

        let history = self.state.chat.clone();
        self.state.reduce(Action::ChatSubmitted(message.to_string()));

        let adapter = Arc::clone(&self.adapter);
        let subscription = chat::start_chat(adapter.as_ref(), &catalog, &history, message).await;
        let handle = subscription.cancel_handle();
        self.chat = Some(subscription);
        Ok(handle)
    }

    /// Receive the next fragment of the pending reply.
    pub async fn pump_chat(&mut self) -> ChatPump {
        let Some(subscription) = self.chat.as_mut() else {
            return ChatPump::Done;
        };
        match subscription.next().await {
            Some(Ok(chunk)) => {
                self.state.reduce(Action::ChatChunk(chunk.clone()));
                ChatPump::Chunk(chunk)
            }
            Some(Err(e)) => {
                let message = e.to_string();
                self.state.reduce(Action::ChatFailed(message.clone()));
                self.finish_chat();
                ChatPump::Failed(message)
            }
            None => {
                self.finish_chat();
                ChatPump::Done
            }
        }
    }

    /// Pump until the pending reply is complete and return its full text.
    pub async fn drain_chat(&mut self) -> String {
        loop {
            if let ChatPump::Failed(_) | ChatPump::Done = self.pump_chat().await {
                break;
            }
        }
        self.state
            .chat
            .last()
            .map(|m| m.text.clone())
            .unwrap_or_default()
    }

    /// Stop the pending reply, keeping whatever already arrived.
    pub fn cancel_chat(&mut self) {
        if let Some(ref subscription) = self.chat {
            info!("Chat reply cancelled");
            subscription.cancel();
        }
    }

    fn finish_chat(&mut self) {
        self.chat = None;
        self.state.reduce(Action::ChatFinished);
    }

    /// Export the current catalog or the current view.
    pub fn export(&self, format: ExportFormat, scope: ExportScope) -> Result<ExportFile, CatalogError> {
        match scope {
            ExportScope::Catalog => {
                let catalog = self.state.catalog.as_ref().ok_or(CatalogError::NothingToExport)?;
                export::export_file(catalog, format)
            }
            ExportScope::View => {
                let view = self.state.derived().ok_or(CatalogError::NothingToExport)?;
                export::export_file(&view.catalog, format)
            }
        }
    }

    /// Change the OCR quality for later runs, persisting it when a
    /// preference store is attached.
    ///
    /// The store is written first; when that fails the session keeps its
    /// previous quality.
    pub fn set_ocr_quality(&mut self, quality: OcrQuality) -> Result<(), CatalogError> {
        if let Some(ref prefs) = self.prefs {
            prefs.store_ocr_quality(quality)?;
        }
        self.config.ocr_quality = quality;
        self.state.reduce(Action::SetOcrQuality(quality));
        Ok(())
    }
}
