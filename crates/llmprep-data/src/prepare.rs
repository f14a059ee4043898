//! Tokenizer preparation for training.
//!
//! [`prepare_tokenizer`] loads the tokenizer of the configured base model and
//! patches it so that every special token a training loop relies on is set.
//! Results downstream code needs (separator, mask id, stop words) are written
//! into [`ExperimentConfig::tokenizer_state`].

use crate::escape::decode_unicode_escape;
use crate::special_tokens::SpecialTokenKind;
use crate::tokenizer::{LoadOptions, Tokenizer};
use llmprep_core::{ExperimentConfig, Result};

/// End-of-sequence token substituted when the tokenizer declares an empty one.
pub const DEFAULT_EOS_TOKEN: &str = "</s>";

/// Beginning-of-sequence token substituted when the tokenizer declares an empty one.
pub const DEFAULT_BOS_TOKEN: &str = "<s>";

/// Backbone family whose accelerated tokenizer is incompatible.
const SLOW_TOKENIZER_FAMILY: &str = "llama";

/// Load and configure the tokenizer of `cfg.llm_backbone`.
///
/// The backbone may be a local directory or a hub repository id, fetched at
/// `cfg.environment.huggingface_branch` with the token from
/// `HUGGINGFACE_TOKEN` if set. Mutates `cfg`: `tokenizer.use_fast` may be
/// switched off and `tokenizer_state` is filled in (see
/// [`configure_tokenizer`]).
pub async fn prepare_tokenizer(cfg: &mut ExperimentConfig) -> Result<Tokenizer> {
    force_slow_tokenizer_if_needed(cfg);

    if cfg.environment.trust_remote_code {
        tracing::warn!("trust_remote_code is set but has no effect; no remote code is run");
    }

    let token = llmprep_hub::hf_token_from_env();
    let dir = llmprep_hub::resolve_tokenizer_dir(
        &cfg.llm_backbone,
        Some(cfg.environment.huggingface_branch.as_str()),
        token.as_ref(),
        cfg.environment.cache_dir.as_deref(),
    )
    .await?;

    let options = LoadOptions {
        add_prefix_space: cfg.tokenizer.add_prefix_space,
        use_fast: cfg.tokenizer.use_fast,
    };
    let mut tokenizer = Tokenizer::from_pretrained_dir(&dir, options)?;
    configure_tokenizer(cfg, &mut tokenizer)?;
    Ok(tokenizer)
}

/// Switch to the non-accelerated tokenizer for llama backbones.
///
/// Returns whether the switch happened.
pub fn force_slow_tokenizer_if_needed(cfg: &mut ExperimentConfig) -> bool {
    if !cfg.llm_backbone.contains(SLOW_TOKENIZER_FAMILY) {
        return false;
    }
    tracing::info!("Llama backbone detected, forcing slow tokenizer.");
    cfg.tokenizer.use_fast = false;
    true
}

/// Apply special-token fallbacks, padding and stop words to a loaded tokenizer.
///
/// After this returns, the tokenizer's eos, bos, pad, cls and sep tokens are
/// all non-empty and `cfg.tokenizer_state` holds the separator, eos token,
/// mask id, stop words with their ids, and the base vocabulary size.
pub fn configure_tokenizer(cfg: &mut ExperimentConfig, tokenizer: &mut Tokenizer) -> Result<()> {
    if let Some(side) = cfg.tokenizer.padding_side {
        tokenizer.set_padding_side(side);
    }

    ensure_special_token(tokenizer, SpecialTokenKind::Eos, DEFAULT_EOS_TOKEN);
    ensure_special_token(tokenizer, SpecialTokenKind::Bos, DEFAULT_BOS_TOKEN);

    let eos = tokenizer
        .special_token(SpecialTokenKind::Eos)
        .unwrap_or(DEFAULT_EOS_TOKEN)
        .to_string();
    for kind in [
        SpecialTokenKind::Pad,
        SpecialTokenKind::Cls,
        SpecialTokenKind::Sep,
    ] {
        ensure_special_token(tokenizer, kind, &eos);
    }

    let state = &mut cfg.tokenizer_state;
    state.sep_token = tokenizer
        .special_token(SpecialTokenKind::Sep)
        .map(str::to_string);
    state.mask_token_id = Some(mask_token_id(tokenizer)?);
    state.eos_token = Some(eos);

    let stop_words = collect_stop_words(cfg, tokenizer)?;
    let stop_words_ids = stop_words
        .iter()
        .map(|word| tokenizer.encode(word))
        .collect::<Result<Vec<_>>>()?;

    if cfg.environment.local_rank == 0 {
        tracing::info!("Stop token ids: {:?}", stop_words_ids);
    }

    let state = &mut cfg.tokenizer_state;
    state.vocab_length = Some(tokenizer.vocab_size());
    state.stop_words = stop_words;
    state.stop_words_ids = stop_words_ids;

    tokenizer.apply_padding()
}

/// Give `kind` the value `fallback` when it is missing or empty.
fn ensure_special_token(tokenizer: &mut Tokenizer, kind: SpecialTokenKind, fallback: &str) {
    let missing = tokenizer
        .special_token(kind)
        .map_or(true, |token| token.is_empty());
    if missing {
        tracing::debug!(%kind, token = fallback, "Substituting special token");
        tokenizer.set_special_token(kind, fallback);
    }
}

/// Resolve the id used for masking: unk, else mask, else the last id.
fn mask_token_id(tokenizer: &Tokenizer) -> Result<u32> {
    if let Some(id) = tokenizer.special_token_id(SpecialTokenKind::Unk) {
        return Ok(id);
    }
    if let Some(id) = tokenizer.special_token_id(SpecialTokenKind::Mask) {
        return Ok(id);
    }
    // The last entry is usually the eos token.
    u32::try_from(tokenizer.len().saturating_sub(1)).map_err(|_| {
        llmprep_core::PrepError::Tokenizer(format!(
            "vocabulary of {} entries exceeds the id range",
            tokenizer.len()
        ))
    })
}

/// Collect stop words from the config, registering prompt/answer markers.
///
/// Order: comma-separated `prediction.stop_tokens` first, then the decoded
/// prompt-start and answer-separator markers. Empty entries are dropped and
/// duplicates keep their first position.
fn collect_stop_words(cfg: &ExperimentConfig, tokenizer: &mut Tokenizer) -> Result<Vec<String>> {
    let mut words: Vec<String> = cfg
        .prediction
        .stop_tokens
        .split(',')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect();

    for marker in [
        &cfg.dataset.text_prompt_start,
        &cfg.dataset.text_answer_separator,
    ] {
        let word = decode_unicode_escape(marker)?.trim().to_string();
        if !word.is_empty()
            && cfg.tokenizer.add_prompt_answer_tokens
            && !tokenizer.contains_token(&word)
        {
            tokenizer.add_tokens(&[word.as_str()]);
        }
        words.push(word);
    }

    let mut unique = Vec::with_capacity(words.len());
    for word in words {
        if !word.is_empty() && !unique.contains(&word) {
            unique.push(word);
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_slow_tokenizer_for_llama() {
        let mut cfg = ExperimentConfig::default();
        cfg.llm_backbone = "h2oai/h2ogpt-4096-llama2-7b".into();
        assert!(force_slow_tokenizer_if_needed(&mut cfg));
        assert!(!cfg.tokenizer.use_fast);
    }

    #[test]
    fn test_other_backbones_keep_fast_tokenizer() {
        let mut cfg = ExperimentConfig::default();
        cfg.llm_backbone = "EleutherAI/pythia-70m".into();
        assert!(!force_slow_tokenizer_if_needed(&mut cfg));
        assert!(cfg.tokenizer.use_fast);
    }

    #[test]
    fn test_llama_match_is_case_sensitive() {
        let mut cfg = ExperimentConfig::default();
        cfg.llm_backbone = "meta-llama/Llama-2-7b-hf".into();
        // "meta-llama" contains the lowercase family name.
        assert!(force_slow_tokenizer_if_needed(&mut cfg));

        let mut cfg = ExperimentConfig::default();
        cfg.llm_backbone = "org/LLAMA-ish".into();
        assert!(!force_slow_tokenizer_if_needed(&mut cfg));
    }
}
