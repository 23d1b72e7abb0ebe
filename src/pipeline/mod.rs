//! Pipeline stages for invoice analysis.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ prompts ──▶ llm ──▶ payload
//! (lopdf)    (template)  (model)  ({…} span → record)
//! ```
//!
//! 1. [`extract`]: PDF bytes to concatenated page text; runs in
//!    `spawn_blocking`
//! 2. [`crate::prompts`]: embed the text in the fixed instruction template
//! 3. [`llm`]: the only stage with network I/O; owns timeout and retry
//! 4. [`payload`]: recover and strictly parse the JSON object of the reply

pub mod extract;
pub mod llm;
pub mod payload;
