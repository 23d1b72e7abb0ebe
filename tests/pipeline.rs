//! Pipeline integration tests: PDF bytes → prompt → scripted model → record.

mod common;

use common::{client_with, pdf_with_pages, ScriptedBackend, Step, INVOICE_JSON};
use invoice_analyzer::{AnalysisClient, AnalysisConfig, AnalyzerError, PLACEHOLDER};

#[tokio::test]
async fn reply_with_prose_around_object_yields_record() {
    let backend = ScriptedBackend::replying(
        "Here is the result:\n{\"tipo_servicio\":\"software\",\"tipo_pago\":\"tarjeta\"}\nThanks",
    );
    let client = client_with(backend.clone());

    let analysis = client
        .analyze_pdf(pdf_with_pages(&["Licencia anual"]))
        .await
        .unwrap();
    let output = analysis.outcome.unwrap();

    let keys: Vec<&str> = output.record.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["tipo_servicio", "tipo_pago"]);
    assert_eq!(output.record.get_str("tipo_servicio"), Some("software"));
    assert_eq!(output.record.get_str("tipo_pago"), Some("tarjeta"));

    let view = output.record.view();
    assert_eq!(view.accounting_entry_or_default(), PLACEHOLDER);
    assert!(view.chart().is_none());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn reply_without_object_is_no_result() {
    let backend = ScriptedBackend::replying("No puedo procesar esto.");
    let client = client_with(backend.clone());

    let analysis = client
        .analyze_pdf(pdf_with_pages(&["Factura"]))
        .await
        .unwrap();
    assert!(analysis.text.contains("Factura"));
    assert!(matches!(
        analysis.outcome,
        Err(AnalyzerError::PayloadNotFound)
    ));
    // Payload errors are final: the model is not asked again.
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn malformed_object_reports_position() {
    let backend = ScriptedBackend::replying(r#"{"a": }"#);
    let client = client_with(backend.clone());

    let err = client.analyze_text("Factura").await.unwrap_err();
    match err {
        AnalyzerError::JsonDecode { line, payload, .. } => {
            assert_eq!(line, 1);
            assert_eq!(payload, r#"{"a": }"#);
        }
        other => panic!("expected JsonDecode, got {other:?}"),
    }
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn prompt_carries_pages_in_order() {
    let backend = ScriptedBackend::replying(INVOICE_JSON);
    let client = client_with(backend.clone());

    client
        .analyze_pdf(pdf_with_pages(&["PRIMERA", "SEGUNDA"]))
        .await
        .unwrap()
        .outcome
        .unwrap();

    let prompt = &backend.prompts()[0];
    let first = prompt.find("PRIMERA").expect("page 1 in prompt");
    let second = prompt.find("SEGUNDA").expect("page 2 in prompt");
    assert!(first < second);
}

#[tokio::test]
async fn full_record_fills_view_and_chart() {
    let client = client_with(ScriptedBackend::replying(INVOICE_JSON));

    let output = client.analyze_text("Factura de luz").await.unwrap();
    let view = output.record.view();
    assert_eq!(view.payment_type_or_default(), "domiciliación bancaria");
    assert_eq!(view.total_amount, Some(121.0));

    let chart = view.chart().expect("chart");
    assert!((chart.base_share + chart.tax_share - 1.0).abs() < 1e-9);
    assert_eq!(output.stats.prompt_tokens, 120);
    assert_eq!(output.stats.retries, 0);
}

#[tokio::test]
async fn non_pdf_upload_never_reaches_model() {
    let backend = ScriptedBackend::replying(INVOICE_JSON);
    let client = client_with(backend.clone());

    let err = client
        .analyze_pdf(b"PK\x03\x04 not a pdf".to_vec())
        .await
        .unwrap_err();
    assert!(err.is_document_error());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let backend = ScriptedBackend::replying(INVOICE_JSON);
    let config = AnalysisConfig::builder()
        .backend(backend.clone())
        .max_upload_bytes(16)
        .build()
        .unwrap();
    let client = AnalysisClient::with_backend(backend.clone(), config);

    let err = client
        .analyze_pdf(pdf_with_pages(&["x"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::UploadTooLarge { limit: 16, .. }));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let backend = ScriptedBackend::new(vec![
        Step::Fail(AnalyzerError::Transport {
            message: "connection reset".into(),
        }),
        Step::Reply(INVOICE_JSON.into()),
    ]);
    let client = client_with(backend.clone());

    let output = client.analyze_text("Factura").await.unwrap();
    assert_eq!(output.stats.retries, 1);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn retry_budget_is_bounded() {
    let fail = || {
        Step::Fail(AnalyzerError::Transport {
            message: "503".into(),
        })
    };
    let backend = ScriptedBackend::new(vec![fail(), fail(), fail()]);
    let client = client_with(backend.clone());

    let err = client.analyze_text("Factura").await.unwrap_err();
    assert!(matches!(err, AnalyzerError::Transport { .. }));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let backend = ScriptedBackend::new(vec![Step::Fail(AnalyzerError::Auth {
        message: "401 invalid key".into(),
    })]);
    let client = client_with(backend.clone());

    let err = client.analyze_text("Factura").await.unwrap_err();
    assert!(matches!(err, AnalyzerError::Auth { .. }));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_service_times_out() {
    let backend = ScriptedBackend::new(vec![Step::Stall, Step::Stall]);
    let config = AnalysisConfig::builder()
        .backend(backend.clone())
        .api_timeout_secs(5)
        .retry_backoff_ms(100)
        .build()
        .unwrap();
    let client = AnalysisClient::with_backend(backend.clone(), config);

    let err = client.analyze_text("Factura").await.unwrap_err();
    assert!(matches!(err, AnalyzerError::Timeout { secs: 5 }));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stall_then_reply_recovers() {
    let backend = ScriptedBackend::new(vec![Step::Stall, Step::Reply(INVOICE_JSON.into())]);
    let config = AnalysisConfig::builder()
        .backend(backend.clone())
        .api_timeout_secs(5)
        .build()
        .unwrap();
    let client = AnalysisClient::with_backend(backend.clone(), config);

    let output = client.analyze_text("Factura").await.unwrap();
    assert_eq!(output.record.get_str("tipo_pago"), Some("domiciliación bancaria"));
    assert_eq!(output.stats.retries, 1);
}

#[tokio::test]
async fn reprocess_reuses_text_with_fresh_call() {
    let backend = ScriptedBackend::new(vec![
        Step::Reply("sin json".into()),
        Step::Reply(INVOICE_JSON.into()),
    ]);
    let client = client_with(backend.clone());

    let first = client
        .analyze_pdf(pdf_with_pages(&["Factura 42"]))
        .await
        .unwrap();
    assert!(first.outcome.is_err());

    let second = client.analyze_text(&first.text).await.unwrap();
    assert_eq!(second.record.get_str("total"), None);
    assert_eq!(second.record.get("total"), Some(&serde_json::json!(121.0)));

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
}
