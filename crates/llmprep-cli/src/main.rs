//! llmprep CLI - prompt text assembly and tokenizer preparation.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use llmprep_core::prelude::*;
use llmprep_data::{load_table, prepare_tokenizer, prompt_texts, SpecialTokenKind, Tokenizer};

#[derive(Parser)]
#[command(name = "llmprep")]
#[command(author, version, about = "Prompt text assembly and tokenizer preparation for LLM fine-tuning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble prompt texts from a table, one JSON string per line
    Texts {
        /// Path to experiment configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Table file (.parquet, .csv or .jsonl)
        #[arg(short, long)]
        data: PathBuf,

        /// Prompt column; repeat to join several columns
        #[arg(short, long = "prompt-column")]
        prompt_columns: Vec<String>,

        /// Separator for multi-column prompts
        #[arg(long)]
        separator: Option<String>,

        /// Prepare the tokenizer first and join with its separator token
        #[arg(long)]
        with_tokenizer: bool,

        /// Model ID (HuggingFace or local path), used with --with-tokenizer
        #[arg(short, long)]
        model: Option<String>,

        /// Print at most this many rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Prepare a tokenizer and report the negotiated settings
    Tokenizer {
        /// Path to experiment configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model ID (HuggingFace or local path)
        #[arg(short, long)]
        model: Option<String>,

        /// Hub revision/branch
        #[arg(long)]
        revision: Option<String>,

        /// Padding side (left or right)
        #[arg(long)]
        padding_side: Option<PaddingSide>,

        /// Comma-separated stop tokens
        #[arg(long)]
        stop_tokens: Option<String>,

        /// Register prompt/answer markers as tokens when absent
        #[arg(long)]
        add_prompt_answer_tokens: bool,

        /// Write the enriched configuration (YAML) to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect or clear the download cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache location and size
    Info,
    /// Remove all cached downloads
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Texts {
            config,
            data,
            prompt_columns,
            separator,
            with_tokenizer,
            model,
            limit,
        } => {
            let mut config = load_config(config.as_deref())?;
            apply_texts_overrides(&mut config, model, prompt_columns);
            run_texts(config, &data, separator.as_deref(), with_tokenizer, limit).await
        }
        Commands::Tokenizer {
            config,
            model,
            revision,
            padding_side,
            stop_tokens,
            add_prompt_answer_tokens,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            apply_tokenizer_overrides(
                &mut config,
                TokenizerOverrides {
                    model,
                    revision,
                    padding_side,
                    stop_tokens,
                    add_prompt_answer_tokens,
                },
            );
            run_tokenizer(config, output.as_deref()).await
        }
        Commands::Cache { action } => match action {
            CacheAction::Info => {
                let size = llmprep_hub::cache_size()?;
                println!("Cache directory: {}", llmprep_hub::cache_dir().display());
                println!("Cache size: {:.2} MB", size as f64 / (1024.0 * 1024.0));
                Ok(())
            }
            CacheAction::Clear => {
                llmprep_hub::clear_cache()?;
                tracing::info!(path = %llmprep_hub::cache_dir().display(), "Cache cleared");
                Ok(())
            }
        },
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ExperimentConfig> {
    match path {
        Some(path) => Ok(ExperimentConfig::from_yaml_file(path)?),
        None => Ok(ExperimentConfig::default()),
    }
}

/// Override the configured backbone and prompt columns.
///
/// One column selects a single prompt column, several select a joined prompt.
fn apply_texts_overrides(
    config: &mut ExperimentConfig,
    model: Option<String>,
    mut prompt_columns: Vec<String>,
) {
    if let Some(model) = model {
        config.llm_backbone = model;
    }
    match prompt_columns.len() {
        0 => {}
        1 => config.dataset.prompt_column = PromptColumn::Single(prompt_columns.remove(0)),
        _ => config.dataset.prompt_column = PromptColumn::Multiple(prompt_columns),
    }
}

/// Command-line values for the `tokenizer` command.
#[derive(Default)]
struct TokenizerOverrides {
    model: Option<String>,
    revision: Option<String>,
    padding_side: Option<PaddingSide>,
    stop_tokens: Option<String>,
    add_prompt_answer_tokens: bool,
}

fn apply_tokenizer_overrides(config: &mut ExperimentConfig, overrides: TokenizerOverrides) {
    if let Some(model) = overrides.model {
        config.llm_backbone = model;
    }
    if let Some(revision) = overrides.revision {
        config.environment.huggingface_branch = revision;
    }
    if overrides.padding_side.is_some() {
        config.tokenizer.padding_side = overrides.padding_side;
    }
    if let Some(stop_tokens) = overrides.stop_tokens {
        config.prediction.stop_tokens = stop_tokens;
    }
    // The flag can only switch registration on.
    if overrides.add_prompt_answer_tokens {
        config.tokenizer.add_prompt_answer_tokens = true;
    }
}

async fn run_texts(
    mut config: ExperimentConfig,
    data: &Path,
    separator: Option<&str>,
    with_tokenizer: bool,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    if with_tokenizer {
        if config.llm_backbone.is_empty() {
            anyhow::bail!("--with-tokenizer needs a model (--model or llm_backbone in the config)");
        }
        prepare_tokenizer(&mut config).await?;
    }

    let table = load_table(data)?;
    let texts = prompt_texts(&table, &config, separator)?;
    tracing::info!(rows = texts.len(), "Assembled prompt texts");

    for text in texts.iter().take(limit.unwrap_or(usize::MAX)) {
        println!("{}", serde_json::to_string(text)?);
    }
    Ok(())
}

async fn run_tokenizer(mut config: ExperimentConfig, output: Option<&Path>) -> anyhow::Result<()> {
    if config.llm_backbone.is_empty() {
        anyhow::bail!("No model given (--model or llm_backbone in the config)");
    }

    tracing::info!(model = %config.llm_backbone, "Preparing tokenizer");
    let tokenizer = prepare_tokenizer(&mut config).await?;
    print_summary(&config, &tokenizer);

    if let Some(path) = output {
        std::fs::write(path, config.to_yaml_string()?)?;
        tracing::info!(path = %path.display(), "Wrote enriched configuration");
    }
    Ok(())
}

fn print_summary(config: &ExperimentConfig, tokenizer: &Tokenizer) {
    let state = &config.tokenizer_state;

    println!("Model: {}", config.llm_backbone);
    println!(
        "Variant: {}",
        if tokenizer.is_fast() { "fast" } else { "slow" }
    );
    println!("Vocabulary: {} base, {} total", tokenizer.vocab_size(), tokenizer.len());
    println!("Padding side: {:?}", tokenizer.padding_side());
    println!("Special tokens:");
    for kind in SpecialTokenKind::ALL {
        let token = tokenizer.special_token(kind).unwrap_or("-");
        match tokenizer.special_token_id(kind) {
            Some(id) => println!("  {:<11} {:?} ({})", kind.to_string(), token, id),
            None => println!("  {:<11} {:?}", kind.to_string(), token),
        }
    }
    if let Some(id) = state.mask_token_id {
        println!("Mask token id: {}", id);
    }
    println!("Stop words:");
    for (word, ids) in state.stop_words.iter().zip(&state.stop_words_ids) {
        println!("  {:?} -> {:?}", word, ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_column_count_selects_variant() {
        let mut config = ExperimentConfig::default();
        apply_texts_overrides(&mut config, None, vec![]);
        assert_eq!(config.dataset.prompt_column, PromptColumn::Single("instruction".into()));

        apply_texts_overrides(&mut config, None, vec!["question".into()]);
        assert_eq!(config.dataset.prompt_column, PromptColumn::Single("question".into()));

        apply_texts_overrides(
            &mut config,
            Some("org/model".into()),
            vec!["system".into(), "question".into()],
        );
        assert_eq!(
            config.dataset.prompt_column,
            PromptColumn::Multiple(vec!["system".into(), "question".into()])
        );
        assert_eq!(config.llm_backbone, "org/model");
    }

    #[test]
    fn test_tokenizer_overrides_replace_config_values() {
        let mut config = ExperimentConfig::from_yaml_str(
            "llm_backbone: org/base\ntokenizer:\n  padding_side: right\n  add_prompt_answer_tokens: true\nprediction:\n  stop_tokens: \"</s>\"\n",
        )
        .unwrap();

        apply_tokenizer_overrides(
            &mut config,
            TokenizerOverrides {
                revision: Some("dev".into()),
                padding_side: Some(PaddingSide::Left),
                stop_tokens: Some("###,END".into()),
                ..Default::default()
            },
        );

        assert_eq!(config.llm_backbone, "org/base");
        assert_eq!(config.environment.huggingface_branch, "dev");
        assert_eq!(config.tokenizer.padding_side, Some(PaddingSide::Left));
        assert_eq!(config.prediction.stop_tokens, "###,END");
        // An unset flag keeps the configured value.
        assert!(config.tokenizer.add_prompt_answer_tokens);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = ExperimentConfig::default();
        apply_tokenizer_overrides(&mut config, TokenizerOverrides::default());
        assert_eq!(config.environment.huggingface_branch, "main");
        assert_eq!(config.tokenizer.padding_side, None);
        assert!(!config.tokenizer.add_prompt_answer_tokens);
    }

    #[test]
    fn test_cli_parses_repeated_prompt_columns() {
        let cli = Cli::try_parse_from([
            "llmprep", "texts", "--data", "t.csv", "-p", "system", "-p", "question",
        ])
        .unwrap();
        match cli.command {
            Commands::Texts { prompt_columns, .. } => {
                assert_eq!(prompt_columns, vec!["system", "question"]);
            }
            _ => panic!("expected texts command"),
        }
    }
}
