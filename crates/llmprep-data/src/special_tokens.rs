//! Special token table.

use serde_json::Value;

/// Role of a special token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialTokenKind {
    /// Beginning of sequence.
    Bos,
    /// End of sequence.
    Eos,
    /// Unknown token.
    Unk,
    /// Separator between segments.
    Sep,
    /// Padding.
    Pad,
    /// Classification token.
    Cls,
    /// Mask token.
    Mask,
}

impl SpecialTokenKind {
    /// Every kind, in the order tokenizer configs list them.
    pub const ALL: [SpecialTokenKind; 7] = [
        Self::Bos,
        Self::Eos,
        Self::Unk,
        Self::Sep,
        Self::Pad,
        Self::Cls,
        Self::Mask,
    ];

    /// Key used in `tokenizer_config.json` and `special_tokens_map.json`.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Bos => "bos_token",
            Self::Eos => "eos_token",
            Self::Unk => "unk_token",
            Self::Sep => "sep_token",
            Self::Pad => "pad_token",
            Self::Cls => "cls_token",
            Self::Mask => "mask_token",
        }
    }

    /// Common spellings, tried when no config declares the token.
    fn candidates(self) -> &'static [&'static str] {
        match self {
            Self::Bos => &["<s>", "<|begin_of_text|>", "<bos>"],
            Self::Eos => &["</s>", "<|endoftext|>", "<|end_of_text|>", "<eos>"],
            Self::Unk => &["<unk>", "[UNK]"],
            Self::Sep => &["[SEP]"],
            Self::Pad => &["<pad>", "[PAD]", "<|pad|>", "<|finetune_right_pad_id|>"],
            Self::Cls => &["[CLS]"],
            Self::Mask => &["[MASK]", "<mask>"],
        }
    }
}

impl std::fmt::Display for SpecialTokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Special tokens of a tokenizer, by role.
///
/// `None` means the tokenizer declares no such token. An empty string is
/// kept as-is; some repositories declare `eos_token: ""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialTokens {
    bos: Option<String>,
    eos: Option<String>,
    unk: Option<String>,
    sep: Option<String>,
    pad: Option<String>,
    cls: Option<String>,
    mask: Option<String>,
}

impl SpecialTokens {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the token for a role.
    pub fn get(&self, kind: SpecialTokenKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    /// Set or clear the token for a role.
    pub fn set(&mut self, kind: SpecialTokenKind, token: Option<String>) {
        *self.slot_mut(kind) = token;
    }

    /// Roles whose token is declared.
    pub fn declared(&self) -> impl Iterator<Item = (SpecialTokenKind, &str)> + '_ {
        SpecialTokenKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|token| (kind, token)))
    }

    /// Read special tokens from a `tokenizer_config.json` or
    /// `special_tokens_map.json` document.
    ///
    /// Values may be plain strings or added-token objects with a `content`
    /// field; `null` and other shapes are treated as undeclared.
    pub fn from_json(doc: &Value) -> Self {
        let mut tokens = Self::new();
        for kind in SpecialTokenKind::ALL {
            tokens.set(kind, doc.get(kind.config_key()).and_then(token_content));
        }
        tokens
    }

    /// Fill undeclared roles from `other`.
    pub fn merge_missing(&mut self, other: &SpecialTokens) {
        for kind in SpecialTokenKind::ALL {
            if self.get(kind).is_none() {
                self.set(kind, other.get(kind).map(str::to_string));
            }
        }
    }

    /// Guess special tokens from the vocabulary by common names.
    pub fn detect(tokenizer: &tokenizers::Tokenizer) -> Self {
        let mut tokens = Self::new();
        for kind in SpecialTokenKind::ALL {
            let found = kind
                .candidates()
                .iter()
                .find(|candidate| tokenizer.token_to_id(candidate).is_some())
                .map(|candidate| candidate.to_string());
            tokens.set(kind, found);
        }
        tokens
    }

    fn slot(&self, kind: SpecialTokenKind) -> &Option<String> {
        match kind {
            SpecialTokenKind::Bos => &self.bos,
            SpecialTokenKind::Eos => &self.eos,
            SpecialTokenKind::Unk => &self.unk,
            SpecialTokenKind::Sep => &self.sep,
            SpecialTokenKind::Pad => &self.pad,
            SpecialTokenKind::Cls => &self.cls,
            SpecialTokenKind::Mask => &self.mask,
        }
    }

    fn slot_mut(&mut self, kind: SpecialTokenKind) -> &mut Option<String> {
        match kind {
            SpecialTokenKind::Bos => &mut self.bos,
            SpecialTokenKind::Eos => &mut self.eos,
            SpecialTokenKind::Unk => &mut self.unk,
            SpecialTokenKind::Sep => &mut self.sep,
            SpecialTokenKind::Pad => &mut self.pad,
            SpecialTokenKind::Cls => &mut self.cls,
            SpecialTokenKind::Mask => &mut self.mask,
        }
    }
}

fn token_content(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
