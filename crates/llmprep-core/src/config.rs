//! Configuration types for llmprep.

use crate::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full experiment configuration.
///
/// Tokenizer preparation writes its results into [`tokenizer_state`]; callers
/// read the enriched configuration after preparation has run.
///
/// [`tokenizer_state`]: ExperimentConfig::tokenizer_state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Base model identifier (HuggingFace repo ID or local path).
    #[serde(default)]
    pub llm_backbone: String,

    /// Runtime environment.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Tokenizer loading options.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Dataset layout.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Generation settings.
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Values negotiated during tokenizer preparation.
    #[serde(default)]
    pub tokenizer_state: TokenizerState,
}

impl ExperimentConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| PrepError::Config(e.to_string()))
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PrepError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read config file {}: {}",
                    path.as_ref().display(),
                    e
                ),
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Serialize the configuration (including negotiated state) to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| PrepError::Serialization(e.to_string()))
    }
}

/// Runtime environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Hub revision (branch, tag or commit) to fetch.
    #[serde(default = "default_branch")]
    pub huggingface_branch: String,

    /// Accepted for config compatibility. Nothing is executed from the hub.
    #[serde(default)]
    pub trust_remote_code: bool,

    /// Rank of this process; only rank 0 logs stop-token ids.
    #[serde(default)]
    pub local_rank: usize,

    /// Override for the hub download cache.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            huggingface_branch: default_branch(),
            trust_remote_code: false,
            local_rank: 0,
            cache_dir: None,
        }
    }
}

/// Side on which sequences are padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaddingSide {
    /// Pad before the sequence.
    Left,
    /// Pad after the sequence.
    #[default]
    Right,
}

impl std::str::FromStr for PaddingSide {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(PrepError::InvalidArgument(format!(
                "padding side must be 'left' or 'right', got '{other}'"
            ))),
        }
    }
}

/// Tokenizer loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Prepend a space to the first word (byte-level tokenizers only).
    #[serde(default)]
    pub add_prefix_space: bool,

    /// Use the accelerated tokenizer variant.
    #[serde(default = "default_true")]
    pub use_fast: bool,

    /// Padding side override; `None` keeps the tokenizer's own.
    #[serde(default)]
    pub padding_side: Option<PaddingSide>,

    /// Register prompt/answer markers as vocabulary entries when absent.
    #[serde(default)]
    pub add_prompt_answer_tokens: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            add_prefix_space: false,
            use_fast: true,
            padding_side: None,
            add_prompt_answer_tokens: false,
        }
    }
}

/// Column(s) holding the prompt text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptColumn {
    /// One column, used as-is.
    Single(String),
    /// Several columns, joined in order with the separator.
    Multiple(Vec<String>),
}

impl Default for PromptColumn {
    fn default() -> Self {
        Self::Single("instruction".into())
    }
}

/// Dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Prompt column(s).
    #[serde(default)]
    pub prompt_column: PromptColumn,

    /// Marker placed before the prompt, in escaped literal form.
    #[serde(default = "default_prompt_start")]
    pub text_prompt_start: String,

    /// Marker placed between prompt and answer, in escaped literal form.
    #[serde(default = "default_answer_separator")]
    pub text_answer_separator: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            prompt_column: PromptColumn::default(),
            text_prompt_start: default_prompt_start(),
            text_answer_separator: default_answer_separator(),
        }
    }
}

/// Generation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Comma-separated stop tokens.
    #[serde(default)]
    pub stop_tokens: String,
}

/// State written by tokenizer preparation for downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerState {
    /// Separator token, also the default text-assembly separator.
    #[serde(default)]
    pub sep_token: Option<String>,

    /// End-of-sequence token.
    #[serde(default)]
    pub eos_token: Option<String>,

    /// Id used to mask tokens.
    #[serde(default)]
    pub mask_token_id: Option<u32>,

    /// Ordered, de-duplicated stop words.
    #[serde(default)]
    pub stop_words: Vec<String>,

    /// Token ids of each stop word, parallel to `stop_words`.
    #[serde(default)]
    pub stop_words_ids: Vec<Vec<u32>>,

    /// Base vocabulary size, excluding added tokens.
    #[serde(default)]
    pub vocab_length: Option<usize>,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_branch() -> String {
    "main".into()
}
fn default_prompt_start() -> String {
    "<|prompt|>".into()
}
fn default_answer_separator() -> String {
    "<|answer|>".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ExperimentConfig::default();
        assert_eq!(cfg.environment.huggingface_branch, "main");
        assert!(cfg.tokenizer.use_fast);
        assert_eq!(cfg.tokenizer.padding_side, None);
        assert_eq!(
            cfg.dataset.prompt_column,
            PromptColumn::Single("instruction".into())
        );
        assert_eq!(cfg.dataset.text_prompt_start, "<|prompt|>");
        assert!(cfg.tokenizer_state.stop_words.is_empty());
    }

    #[test]
    fn test_yaml_single_and_multi_prompt_column() {
        let single = ExperimentConfig::from_yaml_str(
            "llm_backbone: gpt2\ndataset:\n  prompt_column: question\n",
        )
        .unwrap();
        assert_eq!(
            single.dataset.prompt_column,
            PromptColumn::Single("question".into())
        );

        let multi = ExperimentConfig::from_yaml_str(
            "llm_backbone: gpt2\ndataset:\n  prompt_column: [system, question]\n",
        )
        .unwrap();
        assert_eq!(
            multi.dataset.prompt_column,
            PromptColumn::Multiple(vec!["system".into(), "question".into()])
        );
        // Unset fields in a present section still take their defaults.
        assert_eq!(multi.dataset.text_answer_separator, "<|answer|>");
    }

    #[test]
    fn test_yaml_padding_side_and_stop_tokens() {
        let cfg = ExperimentConfig::from_yaml_str(
            "tokenizer:\n  padding_side: left\nprediction:\n  stop_tokens: \"</s>,###\"\n",
        )
        .unwrap();
        assert_eq!(cfg.tokenizer.padding_side, Some(PaddingSide::Left));
        assert_eq!(cfg.prediction.stop_tokens, "</s>,###");
    }

    #[test]
    fn test_yaml_roundtrip_keeps_tokenizer_state() {
        let mut cfg = ExperimentConfig::default();
        cfg.tokenizer_state.sep_token = Some("</s>".into());
        cfg.tokenizer_state.stop_words_ids = vec![vec![1, 2]];

        let yaml = cfg.to_yaml_string().unwrap();
        let back = ExperimentConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(back.tokenizer_state, cfg.tokenizer_state);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ExperimentConfig::from_yaml_str("tokenizer: [unclosed").unwrap_err();
        assert!(matches!(err, PrepError::Config(_)));
    }

    #[test]
    fn test_from_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "llm_backbone: meta-llama/Llama-2-7b-hf").unwrap();
        let cfg = ExperimentConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(cfg.llm_backbone, "meta-llama/Llama-2-7b-hf");
    }

    #[test]
    fn test_padding_side_from_str() {
        assert_eq!("left".parse::<PaddingSide>().unwrap(), PaddingSide::Left);
        assert!("middle".parse::<PaddingSide>().is_err());
    }
}
