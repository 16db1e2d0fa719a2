//! Integration tests for the extraction run, detection and the session
//! controller.
//!
//! All of these use a scripted adapter: no network, no pdfium, no API key.

use async_trait::async_trait;
use edgequake_catalog::extract::DETECTION_FAILED_SUMMARY;
use edgequake_catalog::{
    detect_products, run_extraction, Action, Catalog, CatalogError, Category, ChatMessage,
    ChatPump, ChatRole, Confidence, DetectionResult, ExportFormat, ExportScope, ExtractionAdapter,
    ExtractionConfig, ExtractionProgressCallback, OcrQuality, PreferenceStore, ProductLine,
    ReplyStream, ScrapeInput, Session, SourceError, Variant,
};
use futures::stream;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fragment(supplier: &str, category: &str, variants: &[(&str, &str)]) -> Catalog {
    Catalog {
        supplier_name: supplier.into(),
        categories: vec![Category {
            name: category.into(),
            products: vec![ProductLine {
                name: format!("{category} line"),
                description: String::new(),
                variants: variants
                    .iter()
                    .map(|(name, price)| Variant {
                        name: (*name).into(),
                        price: (*price).into(),
                        sku: "N/A".into(),
                        ..Default::default()
                    })
                    .collect(),
            }],
        }],
    }
}

fn url(u: &str) -> ScrapeInput {
    ScrapeInput::Url(u.into())
}

/// Adapter that answers from fixed tables and records what it was asked.
#[derive(Default)]
struct ScriptedAdapter {
    fragments: HashMap<String, Result<Catalog, SourceError>>,
    detections: HashMap<String, Result<DetectionResult, SourceError>>,
    reply: Option<Result<Vec<String>, SourceError>>,
    extracted: Mutex<Vec<(String, OcrQuality)>>,
    chat_history: Mutex<Vec<ChatMessage>>,
}

impl ScriptedAdapter {
    fn with_fragment(mut self, source: &str, result: Result<Catalog, SourceError>) -> Self {
        self.fragments.insert(source.into(), result);
        self
    }

    fn with_detection(mut self, source: &str, result: Result<DetectionResult, SourceError>) -> Self {
        self.detections.insert(source.into(), result);
        self
    }

    fn with_reply(mut self, chunks: &[&str]) -> Self {
        self.reply = Some(Ok(chunks.iter().map(|c| c.to_string()).collect()));
        self
    }

    fn extracted(&self) -> Vec<(String, OcrQuality)> {
        self.extracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionAdapter for ScriptedAdapter {
    async fn extract(&self, input: &ScrapeInput, quality: OcrQuality) -> Result<Catalog, SourceError> {
        let source = input.source_name();
        self.extracted.lock().unwrap().push((source.clone(), quality));
        self.fragments.get(&source).cloned().unwrap_or(Err(SourceError::RequestFailed {
            detail: format!("unscripted source {source}"),
        }))
    }

    async fn detect(&self, input: &ScrapeInput) -> Result<DetectionResult, SourceError> {
        let source = input.source_name();
        self.detections.get(&source).cloned().unwrap_or(Err(SourceError::Timeout { secs: 1 }))
    }

    async fn chat(
        &self,
        _catalog: &Catalog,
        history: &[ChatMessage],
        _message: &str,
    ) -> Result<ReplyStream, SourceError> {
        *self.chat_history.lock().unwrap() = history.to_vec();
        match self.reply.clone() {
            Some(Ok(chunks)) => {
                let items: Vec<Result<String, SourceError>> = chunks.into_iter().map(Ok).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Some(Err(e)) => Err(e),
            None => Err(SourceError::RequestFailed {
                detail: "no reply scripted".into(),
            }),
        }
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_run_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("start {total}"));
    }

    fn on_source_start(&self, index: usize, _total: usize, _source: &str) {
        self.events.lock().unwrap().push(format!("begin {index}"));
    }

    fn on_source_complete(&self, index: usize, _total: usize, _source: &str, variants: usize) {
        self.events.lock().unwrap().push(format!("ok {index} {variants}"));
    }

    fn on_source_error(&self, index: usize, _total: usize, _source: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("err {index}"));
    }

    fn on_run_complete(&self, total: usize, succeeded: usize) {
        self.events.lock().unwrap().push(format!("done {succeeded}/{total}"));
    }
}

fn three_sources() -> ScriptedAdapter {
    ScriptedAdapter::default()
        .with_fragment("https://a.test", Ok(fragment("Acme Corp", "Pumps", &[("P100", "$120")])))
        .with_fragment(
            "https://b.test",
            Err(SourceError::RequestFailed {
                detail: "HTTP 500".into(),
            }),
        )
        .with_fragment("https://c.test", Ok(fragment("Other Co", "pumps", &[("P200", "$80")])))
}

fn three_inputs() -> Vec<ScrapeInput> {
    vec![url("https://a.test"), url("https://b.test"), url("https://c.test")]
}

fn temp_pdf(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"%PDF-1.4\n%fake brochure\n").unwrap();
    path
}

// ── Extraction run ───────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_source_does_not_stop_the_run() {
    let adapter = three_sources();
    let config = ExtractionConfig::default();

    let err = assert_err!(run_extraction(&adapter, &three_inputs(), &config).await);
    assert_eq!(adapter.extracted().len(), 3, "every input is attempted");

    match err {
        CatalogError::RunFailed { failures, partial } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].source, "https://b.test");
            assert_eq!(partial.supplier_name, "Acme Corp");
            assert_eq!(partial.categories.len(), 1, "Pumps and pumps merge");
            let names: Vec<_> = partial.variants().map(|v| v.name.as_str()).collect();
            assert_eq!(names, vec!["P100", "P200"]);
        }
        other => panic!("expected RunFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn keep_partial_returns_catalog_with_warnings() {
    let adapter = three_sources();
    let config = ExtractionConfig::builder().keep_partial(true).build().unwrap();

    let output = assert_ok!(run_extraction(&adapter, &three_inputs(), &config).await);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.stats.total_sources, 3);
    assert_eq!(output.stats.succeeded, 2);
    assert_eq!(output.stats.failed, 1);
    assert_eq!(output.catalog.summary().variants, 2);
}

#[tokio::test]
async fn keep_partial_with_nothing_merged_fails() {
    let adapter = ScriptedAdapter::default();
    let config = ExtractionConfig::builder().keep_partial(true).build().unwrap();

    let err = run_extraction(&adapter, &[url("https://a.test")], &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::AllSourcesFailed { ref failures } if failures.len() == 1));
}

#[tokio::test]
async fn empty_result_counts_as_failure() {
    let adapter = ScriptedAdapter::default()
        .with_fragment(
            "https://empty.test",
            Ok(Catalog {
                supplier_name: "https://empty.test".into(),
                categories: vec![],
            }),
        )
        .with_fragment(
            "https://na.test",
            Ok(Catalog {
                supplier_name: "N/A".into(),
                categories: vec![],
            }),
        );
    let config = ExtractionConfig::default();

    let err = run_extraction(&adapter, &[url("https://empty.test"), url("https://na.test")], &config)
        .await
        .unwrap_err();
    let failures = err.failures();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.error == SourceError::NoProductData));
}

#[tokio::test]
async fn first_real_supplier_name_wins() {
    let adapter = ScriptedAdapter::default()
        .with_fragment("https://1.test", Ok(fragment("N/A", "A", &[("a", "1")])))
        .with_fragment("https://2.test", Ok(fragment("", "B", &[("b", "2")])))
        .with_fragment("https://3.test", Ok(fragment("Acme Corp", "C", &[("c", "3")])))
        .with_fragment("https://4.test", Ok(fragment("Other Co", "D", &[("d", "4")])));
    let inputs: Vec<_> = (1..=4).map(|i| url(&format!("https://{i}.test"))).collect();

    let output = run_extraction(&adapter, &inputs, &ExtractionConfig::default())
        .await
        .unwrap();
    assert_eq!(output.catalog.supplier_name, "Acme Corp");
    let categories: Vec<_> = output.catalog.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(categories, vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn missing_supplier_name_gets_placeholder() {
    let adapter =
        ScriptedAdapter::default().with_fragment("https://a.test", Ok(fragment("", "Pumps", &[("P1", "$1")])));
    let output = run_extraction(&adapter, &[url("https://a.test")], &ExtractionConfig::default())
        .await
        .unwrap();
    assert_eq!(output.catalog.supplier_name, "Supplier Name Not Found");
}

#[tokio::test]
async fn variants_are_tagged_with_their_source() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_pdf(&dir, "brochure.pdf");
    let adapter = ScriptedAdapter::default()
        .with_fragment("https://a.test", Ok(fragment("Acme", "Pumps", &[("P100", "$1")])))
        .with_fragment("brochure.pdf", Ok(fragment("Acme", "Valves", &[("V1", "$2")])));

    let output = run_extraction(
        &adapter,
        &[url("https://a.test"), ScrapeInput::File(pdf)],
        &ExtractionConfig::default(),
    )
    .await
    .unwrap();
    let sources: Vec<_> = output.catalog.variants().map(|v| v.source.as_str()).collect();
    assert_eq!(sources, vec!["https://a.test", "brochure.pdf"]);
}

#[tokio::test]
async fn invalid_inputs_fail_before_any_adapter_call() {
    let adapter = three_sources();
    let config = ExtractionConfig::default();

    let err = run_extraction(&adapter, &[], &config).await.unwrap_err();
    assert!(matches!(err, CatalogError::NoInputs));

    let err = run_extraction(&adapter, &[url("ftp://a.test/x")], &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidInput { .. }));

    let missing = ScrapeInput::File(PathBuf::from("/definitely/not/here.pdf"));
    let err = run_extraction(&adapter, &[url("https://a.test"), missing], &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::FileNotFound { .. }));

    let dir = tempfile::tempdir().unwrap();
    let not_pdf = dir.path().join("notes.pdf");
    std::fs::write(&not_pdf, b"hello").unwrap();
    let err = run_extraction(&adapter, &[ScrapeInput::File(not_pdf)], &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotAPdf { .. }));

    assert!(adapter.extracted().is_empty());
}

#[tokio::test]
async fn progress_events_arrive_in_order() {
    let adapter = three_sources();
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .keep_partial(true)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    run_extraction(&adapter, &three_inputs(), &config).await.unwrap();
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start 3", "begin 0", "ok 0 1", "begin 1", "err 1", "begin 2", "ok 2 1", "done 2/3"
        ]
    );
}

#[tokio::test]
async fn extraction_uses_configured_quality() {
    let adapter = three_sources();
    let config = ExtractionConfig::builder()
        .ocr_quality(OcrQuality::Standard)
        .keep_partial(true)
        .build()
        .unwrap();
    run_extraction(&adapter, &three_inputs(), &config).await.unwrap();
    assert!(adapter.extracted().iter().all(|(_, q)| *q == OcrQuality::Standard));
}

// ── Detection ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_detection_becomes_low_confidence() {
    let adapter = ScriptedAdapter::default().with_detection(
        "https://shop.test",
        Ok(DetectionResult {
            source: "https://shop.test".into(),
            confidence: Confidence::High,
            summary: "Lists pumps with prices.".into(),
        }),
    );

    let results = detect_products(&adapter, &[url("https://shop.test"), url("https://down.test")])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].confidence, Confidence::High);
    assert_eq!(results[1].source, "https://down.test");
    assert_eq!(results[1].confidence, Confidence::Low);
    assert_eq!(results[1].summary, DETECTION_FAILED_SUMMARY);
}

#[tokio::test]
async fn detection_validates_inputs() {
    let adapter = ScriptedAdapter::default();
    let err = detect_products(&adapter, &[]).await.unwrap_err();
    assert!(matches!(err, CatalogError::NoInputs));
}

// ── Session ──────────────────────────────────────────────────────────────────

fn session_with(adapter: ScriptedAdapter) -> (Session, Arc<ScriptedAdapter>) {
    let adapter = Arc::new(adapter);
    let session = Session::new(adapter.clone(), ExtractionConfig::default());
    (session, adapter)
}

#[tokio::test]
async fn session_scrape_success_populates_state() {
    let (mut session, _) = session_with(
        ScriptedAdapter::default()
            .with_fragment("https://a.test", Ok(fragment("Acme Corp", "Pumps", &[("P100", "$120")]))),
    );

    session.scrape(&[url("https://a.test")]).await.unwrap();
    let state = session.state();
    assert!(!state.is_loading());
    assert!(state.error.is_none());
    assert_eq!(state.catalog.as_ref().unwrap().supplier_name, "Acme Corp");
    assert_eq!(state.category_names(), vec!["Pumps"]);
}

#[tokio::test]
async fn session_scrape_failure_keeps_previous_state_cleared() {
    let (mut session, _) = session_with(three_sources());

    session.scrape(&[url("https://a.test")]).await.unwrap();
    assert!(session.state().catalog.is_some());

    let err = session.scrape(&three_inputs()).await.unwrap_err();
    let state = session.state();
    assert!(state.catalog.is_none());
    assert!(!state.is_loading());
    assert_eq!(state.error.as_deref(), Some(err.to_string().as_str()));
    assert!(state.error.as_deref().unwrap().contains("https://b.test"));
}

#[tokio::test]
async fn session_invalid_input_leaves_state_untouched() {
    let (mut session, adapter) = session_with(
        ScriptedAdapter::default()
            .with_fragment("https://a.test", Ok(fragment("Acme Corp", "Pumps", &[("P100", "$120")]))),
    );
    session.scrape(&[url("https://a.test")]).await.unwrap();
    session.dispatch(Action::SetSearch("p".into()));

    let err = session.scrape(&[url("not a url")]).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidInput { .. }));

    let state = session.state();
    assert_eq!(state.catalog.as_ref().unwrap().supplier_name, "Acme Corp");
    assert_eq!(state.view.search, "p");
    assert!(state.error.is_none());
    assert!(!state.is_loading());
    assert_eq!(adapter.extracted().len(), 1);
}

#[tokio::test]
async fn session_detect_records_results() {
    let (mut session, _) = session_with(ScriptedAdapter::default());
    let results = session.detect(&[url("https://x.test")]).await.unwrap();
    assert_eq!(results[0].confidence, Confidence::Low);
    assert!(!session.state().detecting);
    assert_eq!(session.state().detection.as_ref().unwrap(), &results);
}

#[tokio::test]
async fn session_chat_streams_and_sends_prior_history() {
    let (mut session, adapter) = session_with(
        ScriptedAdapter::default()
            .with_fragment("https://a.test", Ok(fragment("Acme", "Pumps", &[("P100", "$120")])))
            .with_reply(&["The P100 ", "costs $120."]),
    );
    session.scrape(&[url("https://a.test")]).await.unwrap();

    session.start_chat("How much is the P100?").await.unwrap();
    assert!(session.state().chat_pending);
    assert!(adapter.chat_history.lock().unwrap().is_empty());

    let answer = session.drain_chat().await;
    assert_eq!(answer, "The P100 costs $120.");
    assert!(!session.state().chat_pending);

    session.start_chat("And the P200?").await.unwrap();
    session.drain_chat().await;
    let history = adapter.chat_history.lock().unwrap().clone();
    assert_eq!(
        history,
        vec![
            ChatMessage::user("How much is the P100?"),
            ChatMessage::model("The P100 costs $120."),
        ]
    );
    assert_eq!(session.state().chat.len(), 4);
}

#[tokio::test]
async fn session_chat_cancel_keeps_partial_reply() {
    let (mut session, _) = session_with(
        ScriptedAdapter::default()
            .with_fragment("https://a.test", Ok(fragment("Acme", "Pumps", &[("P100", "$120")])))
            .with_reply(&["first ", "second ", "third"]),
    );
    session.scrape(&[url("https://a.test")]).await.unwrap();

    let handle = session.start_chat("Tell me everything").await.unwrap();
    assert_eq!(session.pump_chat().await, ChatPump::Chunk("first ".into()));
    handle.cancel();
    assert_eq!(session.pump_chat().await, ChatPump::Done);

    let state = session.state();
    assert!(!state.chat_pending);
    let last = state.chat.last().unwrap();
    assert_eq!(last.role, ChatRole::Model);
    assert_eq!(last.text, "first ");
}

#[tokio::test]
async fn session_chat_failure_becomes_inline_message() {
    let (mut session, _) = session_with(
        ScriptedAdapter::default()
            .with_fragment("https://a.test", Ok(fragment("Acme", "Pumps", &[("P100", "$120")]))),
    );
    session.scrape(&[url("https://a.test")]).await.unwrap();

    session.start_chat("Hello?").await.unwrap();
    assert!(matches!(session.pump_chat().await, ChatPump::Failed(_)));
    let last = session.state().chat.last().unwrap();
    assert!(last.text.starts_with("Sorry, I ran into an error: "));
    assert!(session.state().chat_error.is_some());
}

#[tokio::test]
async fn session_chat_requires_catalog_and_message() {
    let (mut session, _) = session_with(ScriptedAdapter::default().with_reply(&["hi"]));
    assert!(matches!(
        session.start_chat("anything").await,
        Err(CatalogError::ChatUnavailable(_))
    ));
    assert!(session.state().chat.is_empty());
    assert_eq!(session.pump_chat().await, ChatPump::Done);
}

#[tokio::test]
async fn session_export_catalog_or_view() {
    let (mut session, _) = session_with(
        ScriptedAdapter::default()
            .with_fragment("https://a.test", Ok(fragment("Acme Corp", "Pumps", &[("P100", "$120")])))
            .with_fragment("https://c.test", Ok(fragment("Acme Corp", "Valves", &[("V1", "$5")]))),
    );
    assert!(matches!(
        session.export(ExportFormat::Json, ExportScope::Catalog),
        Err(CatalogError::NothingToExport)
    ));

    session
        .scrape(&[url("https://a.test"), url("https://c.test")])
        .await
        .unwrap();
    session.dispatch(Action::ToggleCategory("Valves".into()));

    let full = session.export(ExportFormat::Json, ExportScope::Catalog).unwrap();
    assert_eq!(full.filename, "Acme_Corp_catalog.json");
    let full: Catalog = serde_json::from_slice(&full.bytes).unwrap();
    assert_eq!(full.categories.len(), 2);

    let view = session.export(ExportFormat::Json, ExportScope::View).unwrap();
    let view: Catalog = serde_json::from_slice(&view.bytes).unwrap();
    assert_eq!(view.categories.len(), 1);
    assert_eq!(view.categories[0].name, "Valves");
}

#[tokio::test]
async fn session_quality_is_persisted_and_used() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = PreferenceStore::in_dir(dir.path());
    let (session, adapter) = session_with(
        ScriptedAdapter::default()
            .with_fragment("https://a.test", Ok(fragment("Acme", "Pumps", &[("P100", "$1")]))),
    );
    let mut session = session.with_preferences(prefs.clone());
    assert_eq!(session.state().ocr_quality, OcrQuality::High);

    session.set_ocr_quality(OcrQuality::Standard).unwrap();
    assert_eq!(prefs.load_ocr_quality(), OcrQuality::Standard);

    session.scrape(&[url("https://a.test")]).await.unwrap();
    assert_eq!(adapter.extracted(), vec![("https://a.test".to_string(), OcrQuality::Standard)]);

    let (reopened, _) = session_with(ScriptedAdapter::default());
    let reopened = reopened.with_preferences(prefs);
    assert_eq!(reopened.state().ocr_quality, OcrQuality::Standard);
    assert_eq!(reopened.config().ocr_quality, OcrQuality::Standard);
}

#[tokio::test]
async fn session_quality_unchanged_when_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let (session, _) = session_with(ScriptedAdapter::default());
    let mut session = session.with_preferences(PreferenceStore::in_dir(&blocker));
    assert_eq!(session.config().ocr_quality, OcrQuality::High);

    assert_err!(session.set_ocr_quality(OcrQuality::Standard));
    assert_eq!(session.config().ocr_quality, OcrQuality::High);
    assert_eq!(session.state().ocr_quality, OcrQuality::High);
}
