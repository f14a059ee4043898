//! Prompt text assembly from table columns.

use arrow::array::{Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use llmprep_core::{ExperimentConfig, PrepError, PromptColumn, Result};

/// Separator used when neither the caller nor tokenizer preparation supplied one.
pub const DEFAULT_SEPARATOR: &str = "<SEPARATOR>";

/// Text of a null cell.
pub const NULL_TEXT: &str = "None";

/// Build one prompt string per row.
///
/// A single prompt column is cast to text. Several prompt columns are cast
/// to text and joined per row, in configured order, with `" {separator} "`.
/// The separator is `separator` if given, else the separator negotiated by
/// tokenizer preparation (`cfg.tokenizer_state.sep_token`), else
/// [`DEFAULT_SEPARATOR`]. No rows are dropped.
pub fn prompt_texts(
    batch: &RecordBatch,
    cfg: &ExperimentConfig,
    separator: Option<&str>,
) -> Result<Vec<String>> {
    match &cfg.dataset.prompt_column {
        PromptColumn::Single(column) => column_texts(batch, column),
        PromptColumn::Multiple(columns) => {
            let separator = separator
                .or(cfg.tokenizer_state.sep_token.as_deref())
                .unwrap_or(DEFAULT_SEPARATOR);
            join_columns(batch, columns, separator)
        }
    }
}

/// Join several columns row by row with `" {separator} "`.
pub fn join_columns(
    batch: &RecordBatch,
    columns: &[String],
    separator: &str,
) -> Result<Vec<String>> {
    let join_str = format!(" {} ", separator);
    let casted = columns
        .iter()
        .map(|column| column_texts(batch, column))
        .collect::<Result<Vec<_>>>()?;

    let texts = (0..batch.num_rows())
        .map(|row| {
            casted
                .iter()
                .map(|values| values[row].as_str())
                .collect::<Vec<_>>()
                .join(&join_str)
        })
        .collect();
    Ok(texts)
}

/// Cast one column to text, one string per row.
///
/// Any Arrow type with a cast to UTF-8 is accepted. Nulls become [`NULL_TEXT`].
pub fn column_texts(batch: &RecordBatch, column: &str) -> Result<Vec<String>> {
    let schema = batch.schema();
    let idx = schema
        .index_of(column)
        .map_err(|_| PrepError::ColumnNotFound {
            column: column.to_string(),
            available: schema.fields().iter().map(|f| f.name().clone()).collect(),
        })?;

    let casted = arrow::compute::cast(batch.column(idx).as_ref(), &DataType::Utf8).map_err(|e| {
        PrepError::Table(format!("Column '{}' cannot be cast to text: {}", column, e))
    })?;
    let strings = casted
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PrepError::Table(format!("Column '{}' did not cast to a string array", column)))?;

    Ok((0..strings.len())
        .map(|i| {
            if strings.is_null(i) {
                NULL_TEXT.to_string()
            } else {
                strings.value(i).to_string()
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("system", DataType::Utf8, true),
            Field::new("question", DataType::Utf8, false),
            Field::new("id", DataType::Int64, false),
            Field::new("score", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("Be brief."), None])),
                Arc::new(StringArray::from(vec!["What is Rust?", "Why borrow?"])),
                Arc::new(Int64Array::from(vec![7, 8])),
                Arc::new(Float64Array::from(vec![Some(0.5), None])),
            ],
        )
        .unwrap()
    }

    fn config(column: PromptColumn) -> ExperimentConfig {
        let mut cfg = ExperimentConfig::default();
        cfg.dataset.prompt_column = column;
        cfg
    }

    #[test]
    fn test_single_column() {
        let cfg = config(PromptColumn::Single("question".into()));
        let texts = prompt_texts(&batch(), &cfg, Some("ignored")).unwrap();
        assert_eq!(texts, vec!["What is Rust?", "Why borrow?"]);
    }

    #[test]
    fn test_single_non_string_column_is_cast() {
        let cfg = config(PromptColumn::Single("id".into()));
        assert_eq!(prompt_texts(&batch(), &cfg, None).unwrap(), vec!["7", "8"]);
    }

    #[test]
    fn test_multi_column_default_separator() {
        let cfg = config(PromptColumn::Multiple(vec!["system".into(), "question".into()]));
        let texts = prompt_texts(&batch(), &cfg, None).unwrap();
        assert_eq!(
            texts,
            vec![
                "Be brief. <SEPARATOR> What is Rust?",
                "None <SEPARATOR> Why borrow?"
            ]
        );
    }

    #[test]
    fn test_multi_column_negotiated_separator() {
        let mut cfg = config(PromptColumn::Multiple(vec!["question".into(), "id".into()]));
        cfg.tokenizer_state.sep_token = Some("</s>".into());
        let texts = prompt_texts(&batch(), &cfg, None).unwrap();
        assert_eq!(texts, vec!["What is Rust? </s> 7", "Why borrow? </s> 8"]);
    }

    #[test]
    fn test_multi_column_explicit_separator_wins() {
        let mut cfg = config(PromptColumn::Multiple(vec!["id".into(), "question".into()]));
        cfg.tokenizer_state.sep_token = Some("</s>".into());
        let texts = prompt_texts(&batch(), &cfg, Some("|")).unwrap();
        assert_eq!(texts, vec!["7 | What is Rust?", "8 | Why borrow?"]);
    }

    #[test]
    fn test_multi_column_matches_joined_columns() {
        let table = batch();
        let columns = vec!["question".to_string(), "id".to_string(), "system".to_string()];
        let cfg = config(PromptColumn::Multiple(columns.clone()));
        let texts = prompt_texts(&table, &cfg, Some("[SEP]")).unwrap();

        let casted: Vec<Vec<String>> = columns
            .iter()
            .map(|c| column_texts(&table, c).unwrap())
            .collect();
        for (row, text) in texts.iter().enumerate() {
            let expected = casted
                .iter()
                .map(|col| col[row].clone())
                .collect::<Vec<_>>()
                .join(" [SEP] ");
            assert_eq!(text, &expected);
        }
    }

    #[test]
    fn test_null_cells_render_as_none_for_every_type() {
        let texts = column_texts(&batch(), "score").unwrap();
        assert_eq!(texts, vec!["0.5", NULL_TEXT]);

        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, true)]));
        let ints = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![Some(7), None]))])
            .unwrap();
        // Integers stay integers; no float promotion.
        assert_eq!(column_texts(&ints, "n").unwrap(), vec!["7", NULL_TEXT]);
    }

    #[test]
    fn test_missing_column_error() {
        let cfg = config(PromptColumn::Multiple(vec!["question".into(), "answer".into()]));
        let err = prompt_texts(&batch(), &cfg, None).unwrap_err();
        match err {
            PrepError::ColumnNotFound { column, available } => {
                assert_eq!(column, "answer");
                assert!(available.contains(&"question".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_table() {
        let table = batch().slice(0, 0);
        let cfg = config(PromptColumn::Multiple(vec!["system".into(), "question".into()]));
        assert!(prompt_texts(&table, &cfg, None).unwrap().is_empty());
    }
}
