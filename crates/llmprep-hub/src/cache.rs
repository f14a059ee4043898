//! Local cache management.

use llmprep_core::Result;
use std::path::PathBuf;

/// Get the default cache directory for hub downloads.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("llmprep"))
        .unwrap_or_else(|| PathBuf::from(".cache/llmprep"))
}

/// Clear the download cache.
pub fn clear_cache() -> Result<()> {
    let cache = cache_dir();
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
    }
    Ok(())
}

/// Get cache size in bytes.
pub fn cache_size() -> Result<u64> {
    Ok(dir_size(&cache_dir()))
}

fn dir_size(root: &std::path::Path) -> u64 {
    if !root.exists() {
        return 0;
    }

    walkdir::WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
