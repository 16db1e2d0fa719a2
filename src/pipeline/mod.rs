//! Pipeline stages behind [`crate::adapter::LlmAdapter`].
//!
//! Each submodule implements exactly one step, so each can be tested without
//! a live model.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─▶ render ──▶ encode ─┐
//! input ─────┤   (pdfium)  (base64) ├──▶ llm ──▶ decode
//! (URL/path) └─▶ page text ─────────┘   (chat)   (strict JSON)
//! ```
//!
//! 1. [`input`]  — validate inputs, fetch URLs; a fetched PDF becomes a
//!    document, anything else is reduced to page text
//! 2. [`render`] — rasterise PDF pages or read their text layer; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`] — JPEG-encode and base64-wrap each page image
//! 4. [`llm`]    — build the message list and make one provider call; the
//!    only stage that talks to the model
//! 5. [`decode`] — pull the JSON object out of the reply and decode it into
//!    the declared shape

pub mod decode;
pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
