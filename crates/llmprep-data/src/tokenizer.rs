//! Tokenizer integration.

use crate::special_tokens::{SpecialTokenKind, SpecialTokens};
use llmprep_core::{PaddingSide, PrepError, Result};
use llmprep_hub::{SPECIAL_TOKENS_MAP_FILE, TOKENIZER_CONFIG_FILE, TOKENIZER_FILE};
use serde_json::Value;
use std::path::Path;
use tokenizers::{AddedToken, PaddingDirection, PaddingParams};

/// Options applied while loading a pretrained tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Value forced onto byte-level pre-tokenizers.
    pub add_prefix_space: bool,
    /// Whether the accelerated variant was requested.
    pub use_fast: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            add_prefix_space: false,
            use_fast: true,
        }
    }
}

/// Wrapper around the tokenizers library with a special-token table.
pub struct Tokenizer {
    inner: tokenizers::Tokenizer,
    special_tokens: SpecialTokens,
    padding_side: PaddingSide,
    use_fast: bool,
}

impl Tokenizer {
    fn from_inner(inner: tokenizers::Tokenizer) -> Result<Self> {
        let inner = without_call_settings(inner)?;
        let special_tokens = SpecialTokens::detect(&inner);
        Ok(Self {
            inner,
            special_tokens,
            padding_side: PaddingSide::default(),
            use_fast: true,
        })
    }

    /// Load a tokenizer from a local `tokenizer.json` file.
    ///
    /// Special tokens are guessed from common names.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| PrepError::Tokenizer(e.to_string()))?;
        Self::from_inner(inner)
    }

    /// Load a tokenizer from serialized `tokenizer.json` bytes.
    ///
    /// Special tokens are guessed from common names.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| PrepError::Tokenizer(e.to_string()))?;
        Self::from_inner(inner)
    }

    /// Load a pretrained tokenizer directory.
    ///
    /// Reads `tokenizer.json`, then takes special tokens and the padding side
    /// from `tokenizer_config.json`, with `special_tokens_map.json` filling
    /// tokens the config leaves out. Declared tokens missing from the
    /// vocabulary are registered as special tokens.
    pub fn from_pretrained_dir<P: AsRef<Path>>(dir: P, options: LoadOptions) -> Result<Self> {
        let dir = dir.as_ref();
        let mut definition = read_json(&dir.join(TOKENIZER_FILE))?.ok_or_else(|| {
            PrepError::Tokenizer(format!("{} not found in {}", TOKENIZER_FILE, dir.display()))
        })?;

        if let Some(pre_tokenizer) = definition.get_mut("pre_tokenizer") {
            if set_add_prefix_space(pre_tokenizer, options.add_prefix_space) {
                tracing::debug!(
                    add_prefix_space = options.add_prefix_space,
                    "Patched byte-level pre-tokenizer"
                );
            }
        }

        let bytes = serde_json::to_vec(&definition)
            .map_err(|e| PrepError::Serialization(e.to_string()))?;
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| PrepError::Tokenizer(e.to_string()))?;
        let inner = without_call_settings(inner)?;

        let config = read_json(&dir.join(TOKENIZER_CONFIG_FILE))?;
        let special_map = read_json(&dir.join(SPECIAL_TOKENS_MAP_FILE))?;

        let special_tokens = if config.is_none() && special_map.is_none() {
            SpecialTokens::detect(&inner)
        } else {
            let mut tokens = config
                .as_ref()
                .map(SpecialTokens::from_json)
                .unwrap_or_default();
            if let Some(map) = &special_map {
                tokens.merge_missing(&SpecialTokens::from_json(map));
            }
            tokens
        };

        let padding_side = match config
            .as_ref()
            .and_then(|c| c.get("padding_side"))
            .and_then(Value::as_str)
        {
            Some(side) => side.parse()?,
            None => PaddingSide::default(),
        };

        let mut tokenizer = Self {
            inner,
            special_tokens,
            padding_side,
            use_fast: options.use_fast,
        };
        tokenizer.register_declared_special_tokens();
        Ok(tokenizer)
    }

    fn register_declared_special_tokens(&mut self) {
        let missing: Vec<AddedToken> = self
            .special_tokens
            .declared()
            .filter(|(_, token)| !token.is_empty() && self.inner.token_to_id(token).is_none())
            .map(|(_, token)| AddedToken::from(token.to_string(), true))
            .collect();
        if !missing.is_empty() {
            self.inner.add_special_tokens(&missing);
        }
    }

    /// Encode text to token IDs.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| PrepError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode token IDs to text.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| PrepError::Tokenizer(e.to_string()))
    }

    /// Base vocabulary size, excluding added tokens.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    /// Vocabulary size including added tokens.
    pub fn len(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `token` is a vocabulary entry or an added token.
    pub fn contains_token(&self, token: &str) -> bool {
        self.inner.token_to_id(token).is_some()
    }

    /// Look up the id of a token.
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    /// Register regular (non-special) tokens. Returns how many were new.
    pub fn add_tokens(&mut self, tokens: &[&str]) -> usize {
        let added: Vec<AddedToken> = tokens
            .iter()
            .map(|token| AddedToken::from(token.to_string(), false))
            .collect();
        self.inner.add_tokens(&added)
    }

    /// Get the token for a special role.
    pub fn special_token(&self, kind: SpecialTokenKind) -> Option<&str> {
        self.special_tokens.get(kind)
    }

    /// Get the id of the token for a special role.
    pub fn special_token_id(&self, kind: SpecialTokenKind) -> Option<u32> {
        self.special_token(kind)
            .filter(|token| !token.is_empty())
            .and_then(|token| self.inner.token_to_id(token))
    }

    /// Assign a special role, registering the token as special.
    pub fn set_special_token(&mut self, kind: SpecialTokenKind, token: &str) {
        self.inner
            .add_special_tokens(&[AddedToken::from(token.to_string(), true)]);
        self.special_tokens.set(kind, Some(token.to_string()));
    }

    /// The special-token table.
    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special_tokens
    }

    /// Side on which batches are padded.
    pub fn padding_side(&self) -> PaddingSide {
        self.padding_side
    }

    /// Change the padding side. Takes effect on the next [`apply_padding`].
    ///
    /// [`apply_padding`]: Tokenizer::apply_padding
    pub fn set_padding_side(&mut self, side: PaddingSide) {
        self.padding_side = side;
    }

    /// Configure batch padding with the pad token and padding side.
    pub fn apply_padding(&mut self) -> Result<()> {
        let pad_token = self
            .special_token(SpecialTokenKind::Pad)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PrepError::Tokenizer("pad token is not set".into()))?
            .to_string();
        let pad_id = self.inner.token_to_id(&pad_token).ok_or_else(|| {
            PrepError::Tokenizer(format!("pad token '{}' has no id", pad_token))
        })?;

        let direction = match self.padding_side {
            PaddingSide::Left => PaddingDirection::Left,
            PaddingSide::Right => PaddingDirection::Right,
        };

        self.inner.with_padding(Some(PaddingParams {
            direction,
            pad_id,
            pad_token,
            ..Default::default()
        }));
        Ok(())
    }

    /// Whether the accelerated variant was requested at load time.
    pub fn is_fast(&self) -> bool {
        self.use_fast
    }

    /// Get the underlying tokenizer.
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("vocab_size", &self.vocab_size())
            .field("len", &self.len())
            .field("special_tokens", &self.special_tokens)
            .field("padding_side", &self.padding_side)
            .field("use_fast", &self.use_fast)
            .finish()
    }
}

/// Drop padding and truncation stored in `tokenizer.json`.
///
/// Single texts encode to exactly their tokens; padding is installed later
/// by [`Tokenizer::apply_padding`].
fn without_call_settings(mut inner: tokenizers::Tokenizer) -> Result<tokenizers::Tokenizer> {
    inner.with_padding(None);
    inner
        .with_truncation(None)
        .map_err(|e| PrepError::Tokenizer(e.to_string()))?;
    Ok(inner)
}

/// Read a JSON file, returning `None` when it does not exist.
fn read_json(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content).map_err(|e| {
        PrepError::Serialization(format!("{}: {}", path.display(), e))
    })?;
    Ok(Some(value))
}

/// Force `add_prefix_space` on every byte-level pre-tokenizer, descending
/// into sequences. Returns whether anything changed.
fn set_add_prefix_space(pre_tokenizer: &mut Value, add_prefix_space: bool) -> bool {
    match pre_tokenizer.get("type").and_then(Value::as_str) {
        Some("ByteLevel") => {
            let current = pre_tokenizer.get("add_prefix_space").and_then(Value::as_bool);
            if current == Some(add_prefix_space) {
                return false;
            }
            pre_tokenizer["add_prefix_space"] = Value::Bool(add_prefix_space);
            true
        }
        Some("Sequence") => match pre_tokenizer
            .get_mut("pretokenizers")
            .and_then(Value::as_array_mut)
        {
            Some(items) => items.iter_mut().fold(false, |changed, item| {
                set_add_prefix_space(item, add_prefix_space) || changed
            }),
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_add_prefix_space_byte_level() {
        let mut pre = json!({"type": "ByteLevel", "add_prefix_space": true, "trim_offsets": true});
        assert!(set_add_prefix_space(&mut pre, false));
        assert_eq!(pre["add_prefix_space"], json!(false));
        assert!(!set_add_prefix_space(&mut pre, false));
    }

    #[test]
    fn test_set_add_prefix_space_sequence() {
        let mut pre = json!({
            "type": "Sequence",
            "pretokenizers": [
                {"type": "Split", "pattern": {"Regex": "\\s+"}, "behavior": "Isolated", "invert": false},
                {"type": "ByteLevel", "add_prefix_space": false, "trim_offsets": true}
            ]
        });
        assert!(set_add_prefix_space(&mut pre, true));
        assert_eq!(pre["pretokenizers"][1]["add_prefix_space"], json!(true));
    }

    #[test]
    fn test_set_add_prefix_space_ignores_other_types() {
        let mut pre = json!({"type": "Whitespace"});
        assert!(!set_add_prefix_space(&mut pre, true));
        assert!(pre.get("add_prefix_space").is_none());
    }

    #[test]
    fn test_from_bytes_detects_special_tokens() {
        let definition = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 1, "content": "</s>", "single_word": false, "lstrip": false,
                 "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {"type": "WordLevel", "vocab": {"<unk>": 0, "</s>": 1, "hi": 2}, "unk_token": "<unk>"}
        });
        let mut tokenizer = Tokenizer::from_bytes(&serde_json::to_vec(&definition).unwrap()).unwrap();

        assert_eq!(tokenizer.special_token(SpecialTokenKind::Eos), Some("</s>"));
        assert_eq!(tokenizer.special_token(SpecialTokenKind::Unk), Some("<unk>"));
        assert_eq!(tokenizer.special_token(SpecialTokenKind::Pad), None);
        assert_eq!(tokenizer.encode("hi </s>").unwrap(), vec![2, 1]);
        assert_eq!(tokenizer.vocab_size(), 3);

        assert!(tokenizer.apply_padding().is_err());
        tokenizer.set_special_token(SpecialTokenKind::Pad, "<pad>");
        assert_eq!(tokenizer.len(), 4);
        assert_eq!(tokenizer.special_token_id(SpecialTokenKind::Pad), Some(3));
        tokenizer.apply_padding().unwrap();
        assert_eq!(tokenizer.inner().get_padding().map(|p| p.pad_id), Some(3));
    }

    #[test]
    fn test_read_json_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_json(&dir.path().join("nope.json")).unwrap().is_none());
    }
}
