//! Tokenizer file downloading from HuggingFace Hub.

use hf_hub::api::tokio::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use llmprep_core::{PrepError, Result, SecretString};
use std::path::{Path, PathBuf};

/// Environment variable holding the hub access token.
pub const HF_TOKEN_ENV: &str = "HUGGINGFACE_TOKEN";

/// Serialized tokenizer; every tokenizer repo must ship it.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Tokenizer settings and special tokens.
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// Legacy special-token map, consulted when the config omits a token.
pub const SPECIAL_TOKENS_MAP_FILE: &str = "special_tokens_map.json";

/// Read the hub token from [`HF_TOKEN_ENV`].
pub fn hf_token_from_env() -> Option<SecretString> {
    SecretString::from_env(HF_TOKEN_ENV)
}

/// Build API with optional token authentication and cache override.
fn build_api(token: Option<&SecretString>, cache_dir: Option<&Path>) -> Result<Api> {
    let cache = cache_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(crate::cache_dir);
    let mut builder = ApiBuilder::new()
        .with_progress(false)
        .with_cache_dir(cache);

    if let Some(secret) = token {
        builder = builder.with_token(Some(secret.expose_secret().to_string()));
    }

    builder.build().map_err(|e| PrepError::Hub(e.to_string()))
}

fn model_repo(api: &Api, model_id: &str, revision: Option<&str>) -> ApiRepo {
    match revision {
        Some(rev) => api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            rev.to_string(),
        )),
        None => api.model(model_id.to_string()),
    }
}

/// Download the tokenizer files of a model repository.
///
/// `tokenizer.json` is required; the config and special-token map are
/// fetched when the repository has them. Returns the snapshot directory
/// holding the files.
///
/// # Arguments
/// * `model_id` - Model identifier (e.g., "meta-llama/Llama-2-7b-hf")
/// * `revision` - Optional revision/branch (e.g., "main")
/// * `token` - Optional authentication token
/// * `cache_dir` - Optional cache location, defaults to [`cache_dir`](crate::cache_dir)
pub async fn download_tokenizer_files(
    model_id: &str,
    revision: Option<&str>,
    token: Option<&SecretString>,
    cache_dir: Option<&Path>,
) -> Result<PathBuf> {
    let api = build_api(token, cache_dir)?;
    let repo = model_repo(&api, model_id, revision);

    tracing::info!(model = %model_id, revision = ?revision, "Downloading tokenizer");
    let tokenizer_path = repo.get(TOKENIZER_FILE).await.map_err(|e| {
        PrepError::Hub(format!(
            "Failed to fetch {} for '{}': {}",
            TOKENIZER_FILE, model_id, e
        ))
    })?;

    for optional in [TOKENIZER_CONFIG_FILE, SPECIAL_TOKENS_MAP_FILE] {
        if let Err(e) = repo.get(optional).await {
            tracing::debug!(file = optional, error = %e, "Optional tokenizer file unavailable");
        }
    }

    Ok(tokenizer_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Find the directory holding a model's tokenizer files.
///
/// An existing local directory is returned as-is without touching the
/// network; anything else is treated as a hub repository id.
pub async fn resolve_tokenizer_dir(
    model_id: &str,
    revision: Option<&str>,
    token: Option<&SecretString>,
    cache_dir: Option<&Path>,
) -> Result<PathBuf> {
    let local = Path::new(model_id);
    if local.is_dir() {
        tracing::debug!(path = %local.display(), "Using local tokenizer directory");
        return Ok(local.to_path_buf());
    }

    if model_id.is_empty() {
        return Err(PrepError::InvalidArgument(
            "model identifier is empty".into(),
        ));
    }

    download_tokenizer_files(model_id, revision, token, cache_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_local_directory_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let model_id = dir.path().to_str().unwrap();

        let resolved = resolve_tokenizer_dir(model_id, Some("main"), None, None)
            .await
            .unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[tokio::test]
    async fn test_resolve_empty_id_is_rejected() {
        let err = resolve_tokenizer_dir("", None, None, None).await.unwrap_err();
        assert!(matches!(err, PrepError::InvalidArgument(_)));
    }
}
