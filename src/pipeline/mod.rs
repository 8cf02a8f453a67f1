//! Pipeline stages for document merging.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different fetch transport) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ fetch ──▶ detect ──▶ normalize ──▶ assemble
//! (URL)     (reqwest)  (magic     (lopdf doc)   (page concat)
//!                       bytes)
//! ```
//!
//! 1. [`fetch`]     — retrieve one source's raw bytes with timeout and typed
//!    error classification; the only stage with network I/O
//! 2. [`detect`]    — classify the bytes as PDF or raster image by content
//!    sniffing; URL extensions are never trusted
//! 3. [`normalize`] — turn the bytes into an in-memory PDF document (parse
//!    pass-through for PDFs, single-page wrapping for images); CPU-bound,
//!    callers run it under `spawn_blocking`
//! 4. [`assemble`]  — concatenate normalized documents into one output in
//!    input order; CPU-bound, also run under `spawn_blocking`
//!
//! Stages 1–3 run once per source, concurrently across sources; stage 4 is
//! the fan-in barrier and runs once per request.

pub mod assemble;
pub mod detect;
pub mod fetch;
pub mod normalize;
