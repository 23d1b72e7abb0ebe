//! HTML rendering for the upload form and the analysis dashboard.
//!
//! Pages are assembled from plain strings. Every value that came from the
//! upload or from the model goes through [`escape`] first.

use super::session::Session;
use crate::analyze::AnalysisStats;
use crate::record::{display_value, ChartData, InvoiceRecord, InvoiceView};
use std::f64::consts::PI;
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f5f7fb; color: #1f2937; }
main { max-width: 960px; margin: 0 auto; padding: 2rem 1rem; }
h1 { font-size: 1.6rem; margin-bottom: 1.5rem; }
section { background: #fff; border-radius: 8px; padding: 1rem 1.25rem; margin-bottom: 1rem; box-shadow: 0 1px 3px rgba(0,0,0,.08); }
.error { border-left: 4px solid #dc2626; color: #991b1b; }
.details dt { font-weight: 600; }
.details dd { margin: 0 0 .75rem 0; }
pre { white-space: pre-wrap; font-family: inherit; margin: 0; }
table { border-collapse: collapse; width: 100%; font-size: .9rem; }
th, td { border: 1px solid #e5e7eb; padding: .4rem .6rem; text-align: left; vertical-align: top; }
th { background: #2563eb; color: #fff; }
.actions { display: flex; gap: 1rem; align-items: center; }
.legend span { display: inline-block; width: .8rem; height: .8rem; margin-right: .3rem; }
"#;

const BASE_COLOR: &str = "#2563eb";
const TAX_COLOR: &str = "#f59e0b";

/// Escape text for use in HTML element content and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>Análisis de facturas</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<main>\n\
<h1>Análisis de facturas</h1>\n{body}</main>\n</body>\n</html>\n"
    )
}

fn upload_form() -> &'static str {
    "<section>\n<form method=\"post\" action=\"/analyze\" enctype=\"multipart/form-data\">\n\
<label for=\"file\">Sube una factura en PDF</label>\n\
<input type=\"file\" id=\"file\" name=\"file\" accept=\"application/pdf\" required>\n\
<button type=\"submit\">Analizar</button>\n</form>\n</section>\n"
}

fn error_section(message: &str) -> String {
    format!(
        "<section class=\"error\" role=\"alert\"><p>{}</p></section>\n",
        escape(message)
    )
}

/// The landing page, optionally with an inline error.
pub fn upload_page(message: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(msg) = message {
        body.push_str(&error_section(msg));
    }
    body.push_str(upload_form());
    layout(&body)
}

/// The dashboard for one session.
pub fn dashboard_page(session: &Session) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<section><p>Archivo: <strong>{}</strong> ({} caracteres extraídos)</p></section>",
        escape(&session.file_name),
        session.text.chars().count()
    );

    if let Some(ref msg) = session.message {
        body.push_str(&error_section(msg));
    }

    match session.record {
        Some(ref record) => body.push_str(&record_sections(record)),
        None => body.push_str("<section><p>Sin resultado.</p></section>\n"),
    }
    if let Some(ref stats) = session.stats {
        body.push_str(&stats_section(stats));
    }

    body.push_str(&actions(session));
    body.push_str(upload_form());
    layout(&body)
}

fn record_sections(record: &InvoiceRecord) -> String {
    let view = InvoiceView::from_record(record);
    let mut html = String::new();

    let _ = writeln!(
        html,
        "<section class=\"details\"><h2>Detalles de la factura</h2>\n<dl>\n\
<dt>Tipo de servicio</dt><dd>{}</dd>\n<dt>Tipo de pago</dt><dd>{}</dd>\n</dl></section>",
        escape(view.service_type_or_default()),
        escape(view.payment_type_or_default()),
    );
    let _ = writeln!(
        html,
        "<section><h2>Asiento contable</h2>\n<pre>{}</pre></section>",
        escape(view.accounting_entry_or_default())
    );
    let _ = writeln!(
        html,
        "<section><h2>Resumen</h2>\n<pre>{}</pre></section>",
        escape(view.summary_or_default())
    );

    html.push_str(&preview_table(record));

    if let Some(chart) = view.chart() {
        html.push_str(&chart_section(&chart, view.total_amount));
    }
    html
}

fn preview_table(record: &InvoiceRecord) -> String {
    let mut head = String::new();
    let mut row = String::new();
    for (key, value) in record.iter() {
        let _ = write!(head, "<th>{}</th>", escape(key));
        let _ = write!(row, "<td>{}</td>", escape(&display_value(value)));
    }
    format!(
        "<section><h2>Vista previa</h2>\n<div style=\"overflow-x:auto\"><table>\n\
<thead><tr>{head}</tr></thead>\n<tbody><tr>{row}</tr></tbody>\n</table></div></section>\n"
    )
}

fn chart_section(chart: &ChartData, total: Option<f64>) -> String {
    let total_line = total
        .map(|t| format!("<p>Total: {}</p>", format_amount(t)))
        .unwrap_or_default();
    format!(
        "<section><h2>Base imponible e IVA</h2>\n{svg}\n\
<p class=\"legend\"><span style=\"background:{BASE_COLOR}\"></span>Base imponible {base} ({bp:.1} %) \
<span style=\"background:{TAX_COLOR}\"></span>IVA {tax} ({tp:.1} %)</p>\n{total_line}</section>\n",
        svg = pie_svg(chart),
        base = format_amount(chart.base),
        tax = format_amount(chart.tax),
        bp = chart.base_share * 100.0,
        tp = chart.tax_share * 100.0,
    )
}

/// Two-slice pie: the base fills the circle, the tax slice starts at twelve
/// o'clock and runs clockwise.
pub fn pie_svg(chart: &ChartData) -> String {
    const R: f64 = 80.0;
    const C: f64 = 100.0;
    let open = "<svg width=\"200\" height=\"200\" viewBox=\"0 0 200 200\" role=\"img\" aria-label=\"Proporción base imponible / IVA\">";

    if chart.tax_share >= 1.0 {
        return format!("{open}<circle cx=\"{C}\" cy=\"{C}\" r=\"{R}\" fill=\"{TAX_COLOR}\"/></svg>");
    }
    let base_circle = format!("<circle cx=\"{C}\" cy=\"{C}\" r=\"{R}\" fill=\"{BASE_COLOR}\"/>");
    if chart.tax_share <= 0.0 {
        return format!("{open}{base_circle}</svg>");
    }

    let angle = 2.0 * PI * chart.tax_share;
    let x = C + R * angle.sin();
    let y = C - R * angle.cos();
    let large_arc = u8::from(chart.tax_share > 0.5);
    format!(
        "{open}{base_circle}<path d=\"M {C} {C} L {C} {top:.2} A {R} {R} 0 {large_arc} 1 {x:.2} {y:.2} Z\" fill=\"{TAX_COLOR}\"/></svg>",
        top = C - R,
    )
}

fn stats_section(stats: &AnalysisStats) -> String {
    format!(
        "<section class=\"stats\"><p>Tokens: {} de entrada, {} de salida. \
Reintentos: {}. Modelo: {} ms. Total: {} ms.</p></section>\n",
        stats.prompt_tokens,
        stats.completion_tokens,
        stats.retries,
        stats.llm_duration_ms,
        stats.total_duration_ms,
    )
}

fn actions(session: &Session) -> String {
    let id = session.id;
    let mut html = String::from("<section class=\"actions\">\n");
    let _ = writeln!(
        html,
        "<form method=\"post\" action=\"/sessions/{id}/reprocess\"><button type=\"submit\">Reprocesar</button></form>"
    );
    if session.record.is_some() {
        let _ = writeln!(
            html,
            "<a href=\"/sessions/{id}/export.xlsx\" download>Descargar Excel</a>"
        );
    }
    html.push_str("</section>\n");
    html
}

/// `1234.5` → `"1234.50 €"`.
pub fn format_amount(n: f64) -> String {
    format!("{n:.2} €")
}
