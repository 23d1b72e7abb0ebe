//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use invoice_analyzer::{
    AnalysisClient, AnalysisConfig, AnalyzerError, Completion, CompletionBackend,
    CompletionRequest,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INVOICE_JSON: &str = r#"{
  "tipo_servicio": "suministro eléctrico",
  "tipo_pago": "domiciliación bancaria",
  "asiento_contable": "628 Suministros 100,00 a 410 Acreedores 121,00",
  "resumen": "Factura de luz de enero",
  "base_imponible": 100.0,
  "iva": 21.0,
  "total": 121.0
}"#;

/// A single-page-per-entry PDF built in memory.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save pdf");
    buf
}

/// What the scripted backend does on one call.
pub enum Step {
    Reply(String),
    Fail(AnalyzerError),
    /// Sleep longer than any test timeout, then reply.
    Stall,
}

/// Backend that plays back a fixed script and records every request.
///
/// Once the script is exhausted the last reply is repeated.
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    fallback: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback: INVOICE_JSON.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with `reply`.
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn label(&self) -> String {
        "scripted".into()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.user.clone());

        let step = self.steps.lock().unwrap().pop_front();
        let content = match step {
            Some(Step::Reply(content)) => content,
            Some(Step::Fail(e)) => return Err(e),
            Some(Step::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                self.fallback.clone()
            }
            None => self.fallback.clone(),
        };
        Ok(Completion {
            content,
            prompt_tokens: 120,
            completion_tokens: 80,
        })
    }
}

/// Client over `backend` with no retry backoff.
pub fn client_with(backend: Arc<ScriptedBackend>) -> AnalysisClient {
    let config = AnalysisConfig::builder()
        .backend(backend.clone())
        .retry_backoff_ms(0)
        .build()
        .expect("config");
    AnalysisClient::with_backend(backend, config)
}
