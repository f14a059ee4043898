//! Dataset text assembly and tokenizer preparation for llmprep.
//!
//! This crate provides:
//! - Table loading from Parquet, CSV and JSON Lines into Arrow record batches
//! - Prompt text assembly from one or more table columns
//! - Tokenizer integration with a special-token table
//! - Tokenizer preparation: special-token fallbacks, padding and stop words

#![warn(missing_docs)]

pub mod escape;
pub mod prepare;
pub mod special_tokens;
pub mod table;
pub mod texts;
pub mod tokenizer;

pub use escape::*;
pub use prepare::*;
pub use special_tokens::*;
pub use table::*;
pub use texts::*;
pub use tokenizer::*;
