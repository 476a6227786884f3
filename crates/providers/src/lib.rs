//! Language model service clients for actloop.
//!
//! All providers implement the `actloop_core::Provider` trait.

pub mod openai_compat;
mod sse;

pub use openai_compat::OpenAiCompatProvider;
