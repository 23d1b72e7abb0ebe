//! Prompts for invoice analysis.
//!
//! Every prompt lives here so prompt changes never touch retry or parsing
//! code, and so tests can inspect them without a model. The wording is in
//! Spanish: the model is asked to classify into Spanish payment categories
//! and to write a PGC (Plan General Contable) entry, and answers in the
//! language it is addressed in.
//!
//! Callers can override [`SYSTEM_PROMPT`] via
//! [`crate::config::AnalysisConfig::system_prompt`].

/// Keys the model is asked to produce, in display order.
pub const FIELD_SERVICE_TYPE: &str = "tipo_servicio";
pub const FIELD_PAYMENT_TYPE: &str = "tipo_pago";
pub const FIELD_ACCOUNTING_ENTRY: &str = "asiento_contable";
pub const FIELD_SUMMARY: &str = "resumen";
pub const FIELD_BASE_AMOUNT: &str = "base_imponible";
pub const FIELD_TAX_AMOUNT: &str = "iva";
pub const FIELD_TOTAL_AMOUNT: &str = "total";

/// Payment categories the model must choose from.
pub const PAYMENT_TYPES: [&str; 5] = [
    "efectivo",
    "domiciliación bancaria",
    "transferencia",
    "tarjeta",
    "no especificado",
];

/// Default system message.
pub const SYSTEM_PROMPT: &str = "Eres un experto contable preciso, especializado en el Plan General Contable español (PGC). Respondes únicamente con un objeto JSON válido, sin texto adicional.";

const ANALYSIS_TEMPLATE: &str = r#"Analiza el siguiente texto extraído de una factura en PDF y realiza estas cuatro tareas:

1. TIPO DE SERVICIO
   Clasifica el tipo de servicio o producto facturado (por ejemplo: software, suministros, consultoría, transporte).

2. TIPO DE PAGO
   Clasifica la forma de pago en exactamente una de estas categorías: {payment_types}.

3. ASIENTO CONTABLE
   Genera el asiento contable de partida doble según el Plan General Contable español.
   Indica para cada línea la cuenta del Debe o del Haber, su código de cuenta PGC y el importe.
   La suma del Debe debe ser igual a la suma del Haber.

4. RESUMEN
   Redacta un resumen que incluya la descripción de la factura, la explicación del asiento contable y las observaciones fiscales relevantes (IVA, retenciones, exenciones).

Además, extrae la base imponible, la cuota de IVA y el total de la factura como números (usa null si no aparecen).

Devuelve ÚNICAMENTE un objeto JSON, sin texto antes ni después, con esta forma:
{
  "{service}": "string",
  "{payment}": "string",
  "{entry}": "string",
  "{summary}": "string",
  "{base}": number o null,
  "{tax}": number o null,
  "{total}": number o null
}

Texto de la factura:
"""
{text}
""""#;

/// Build the user message for one invoice.
///
/// The text is embedded verbatim; an empty string still yields a complete
/// prompt.
pub fn build_analysis_prompt(text: &str) -> String {
    // {text} is substituted last so placeholders inside invoice text stay literal.
    ANALYSIS_TEMPLATE
        .replace("{payment_types}", &PAYMENT_TYPES.join(", "))
        .replace("{service}", FIELD_SERVICE_TYPE)
        .replace("{payment}", FIELD_PAYMENT_TYPE)
        .replace("{entry}", FIELD_ACCOUNTING_ENTRY)
        .replace("{summary}", FIELD_SUMMARY)
        .replace("{base}", FIELD_BASE_AMOUNT)
        .replace("{tax}", FIELD_TAX_AMOUNT)
        .replace("{total}", FIELD_TOTAL_AMOUNT)
        .replace("{text}", text)
}
