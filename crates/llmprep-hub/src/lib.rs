//! HuggingFace Hub integration for llmprep.
//!
//! This crate provides:
//! - Tokenizer file downloading from HuggingFace Hub
//! - Local directory resolution for offline use
//! - Local cache management

#![warn(missing_docs)]

mod cache;
mod download;

pub use cache::*;
pub use download::*;
