//! Schema validation of table values.
//!
//! The orchestrator only sees [`SchemaValidator`]; [`ArrowSchemaValidator`]
//! is the default implementation over [`Frame`](crate::frame::Frame).

use crate::frame::Frame;
use crate::schema::{Column, ResolvedSchema};
use crate::value::Value;
use arrow::array::Array;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Row sampling for schema validation.
///
/// With nothing set, every row is checked. Otherwise the union of the first
/// `head` rows, the last `tail` rows and `sample` rows drawn at random is
/// checked. `random_state` seeds the draw; without it every call draws
/// afresh. Column presence and types never depend on sampling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOptions {
    pub head: Option<usize>,
    pub tail: Option<usize>,
    pub sample: Option<usize>,
    pub random_state: Option<u64>,
}

impl ValidateOptions {
    pub fn head(mut self, rows: usize) -> Self {
        self.head = Some(rows);
        self
    }

    pub fn tail(mut self, rows: usize) -> Self {
        self.tail = Some(rows);
        self
    }

    /// Draw this many rows at random; more than the table holds means all.
    pub fn sample(mut self, rows: usize) -> Self {
        self.sample = Some(rows);
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn is_sampled(&self) -> bool {
        self.head.is_some() || self.tail.is_some() || self.sample.is_some()
    }

    /// Row ranges `(offset, length)` to inspect in a table of `len` rows,
    /// ascending and non-overlapping.
    fn row_ranges(&self, len: usize) -> Vec<(usize, usize)> {
        if !self.is_sampled() {
            return vec![(0, len)];
        }

        let mut selected = vec![false; len];
        let head = self.head.unwrap_or(0).min(len);
        selected[..head].fill(true);
        let tail = self.tail.unwrap_or(0).min(len);
        selected[len - tail..].fill(true);

        if let Some(rows) = self.sample {
            let mut rng = match self.random_state {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            for row in index::sample(&mut rng, len, rows.min(len)).into_iter() {
                selected[row] = true;
            }
        }

        let mut ranges = Vec::new();
        let mut start = None;
        for (row, keep) in selected.iter().enumerate() {
            match (start, *keep) {
                (None, true) => start = Some(row),
                (Some(from), false) => {
                    ranges.push((from, row - from));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(from) = start {
            ranges.push((from, len - from));
        }
        ranges
    }
}

/// One failed schema rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFailure {
    pub column: Option<String>,
    pub message: String,
}

impl SchemaFailure {
    pub fn table(message: impl Into<String>) -> Self {
        Self {
            column: None,
            message: message.into(),
        }
    }

    pub fn column(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            message: message.into(),
        }
    }
}

/// Validates a value against a concrete schema.
pub trait SchemaValidator: Send + Sync {
    fn validate(
        &self,
        value: &Value,
        schema: &ResolvedSchema,
        options: &ValidateOptions,
    ) -> Vec<SchemaFailure>;
}

/// Checks presence, type and nullability of Arrow columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowSchemaValidator;

impl SchemaValidator for ArrowSchemaValidator {
    fn validate(
        &self,
        value: &Value,
        schema: &ResolvedSchema,
        options: &ValidateOptions,
    ) -> Vec<SchemaFailure> {
        let Some(frame) = value.as_frame() else {
            return vec![SchemaFailure::table(format!(
                "expected a table, got {}",
                value.kind()
            ))];
        };

        let mut failures = Vec::new();
        let ranges = options.row_ranges(frame.len());

        for (name, column) in &schema.columns {
            validate_column(frame, name, column, &ranges, &mut failures);
        }

        if schema.strict {
            for name in frame.column_names() {
                if !schema.contains(&name) {
                    failures.push(SchemaFailure::column(
                        name.clone(),
                        format!("column '{}' not in schema", name),
                    ));
                }
            }
        }

        failures
    }
}

fn validate_column(
    frame: &Frame,
    name: &str,
    column: &Column,
    ranges: &[(usize, usize)],
    failures: &mut Vec<SchemaFailure>,
) {
    let Some(array) = frame.column(name) else {
        if column.required {
            failures.push(SchemaFailure::column(
                name,
                format!("column '{}' not in dataframe", name),
            ));
        }
        return;
    };

    if let Some(expected) = column.data_type {
        if !expected.accepts(array.data_type()) {
            failures.push(SchemaFailure::column(
                name,
                format!(
                    "expected column '{}' to have type {}, got {}",
                    name,
                    expected,
                    array.data_type()
                ),
            ));
        }
    }

    if !column.nullable {
        let nulls: usize = ranges
            .iter()
            .map(|(offset, len)| array.slice(*offset, *len).null_count())
            .sum();
        if nulls > 0 {
            failures.push(SchemaFailure::column(
                name,
                format!("non-nullable column '{}' contains {} null values", name, nulls),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use std::sync::Arc;

    fn frame() -> Value {
        Frame::from_columns(vec![
            ("a", Arc::new(Int64Array::from(vec![Some(1), None, Some(3), None])) as ArrayRef),
            ("b", Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0])) as ArrayRef),
        ])
        .unwrap()
        .into()
    }

    fn schema(columns: Vec<(&str, Column)>) -> ResolvedSchema {
        ResolvedSchema {
            columns: columns
                .into_iter()
                .map(|(n, c)| (n.to_string(), c))
                .collect(),
            strict: false,
        }
    }

    fn messages(failures: Vec<SchemaFailure>) -> Vec<String> {
        failures.into_iter().map(|f| f.message).collect()
    }

    #[test]
    fn test_valid() {
        let s = schema(vec![
            ("a", Column::of(DataType::Int64).nullable()),
            ("b", Column::of(DataType::Float64)),
        ]);
        assert!(ArrowSchemaValidator
            .validate(&frame(), &s, &ValidateOptions::default())
            .is_empty());
    }

    #[test]
    fn test_missing_and_type() {
        let s = schema(vec![
            ("b", Column::of(DataType::Int64)),
            ("c", Column::any()),
            ("d", Column::any().optional()),
        ]);
        let msgs = messages(ArrowSchemaValidator.validate(&frame(), &s, &ValidateOptions::default()));
        assert_eq!(
            msgs,
            vec![
                "expected column 'b' to have type int64, got Float64".to_string(),
                "column 'c' not in dataframe".to_string(),
            ]
        );
    }

    #[test]
    fn test_nulls_respect_sampling() {
        let s = schema(vec![("a", Column::any())]);
        let all = messages(ArrowSchemaValidator.validate(&frame(), &s, &ValidateOptions::default()));
        assert_eq!(all, vec!["non-nullable column 'a' contains 2 null values"]);

        let head = ValidateOptions::default().head(1);
        assert!(ArrowSchemaValidator.validate(&frame(), &s, &head).is_empty());

        let tail = ValidateOptions::default().tail(1);
        assert_eq!(ArrowSchemaValidator.validate(&frame(), &s, &tail).len(), 1);

        let both = ValidateOptions::default().head(1).tail(2);
        let msgs = messages(ArrowSchemaValidator.validate(&frame(), &s, &both));
        assert_eq!(msgs, vec!["non-nullable column 'a' contains 1 null values"]);
    }

    #[test]
    fn test_overlapping_ranges_count_once() {
        let opts = ValidateOptions::default().head(3).tail(3);
        assert_eq!(opts.row_ranges(4), vec![(0, 4)]);
        assert_eq!(ValidateOptions::default().tail(10).row_ranges(4), vec![(0, 4)]);
    }

    #[test]
    fn test_seeded_sample_is_repeatable() {
        let opts = ValidateOptions::default().sample(3).random_state(42);
        let first = opts.row_ranges(10);
        assert_eq!(first, opts.row_ranges(10));
        assert_eq!(first.iter().map(|(_, n)| n).sum::<usize>(), 3);
        assert!(first.windows(2).all(|w| w[0].0 + w[0].1 < w[1].0));
    }

    #[test]
    fn test_sample_unions_with_head_and_tail() {
        assert_eq!(ValidateOptions::default().sample(10).row_ranges(4), vec![(0, 4)]);
        assert!(ValidateOptions::default().sample(0).row_ranges(4).is_empty());

        let opts = ValidateOptions::default().head(2).tail(2).sample(3).random_state(7);
        let rows: usize = opts.row_ranges(10).iter().map(|(_, n)| n).sum();
        assert!((4..=7).contains(&rows));
        let ranges = opts.row_ranges(10);
        assert_eq!(ranges.first().map(|r| r.0), Some(0));
        assert_eq!(ranges.last().map(|r| r.0 + r.1), Some(10));
    }

    #[test]
    fn test_nulls_in_sampled_rows() {
        let s = schema(vec![("a", Column::any())]);
        let everything = ValidateOptions::default().sample(4).random_state(3);
        let msgs = messages(ArrowSchemaValidator.validate(&frame(), &s, &everything));
        assert_eq!(msgs, vec!["non-nullable column 'a' contains 2 null values"]);

        let none = ValidateOptions::default().sample(0);
        assert!(ArrowSchemaValidator.validate(&frame(), &s, &none).is_empty());
    }

    #[test]
    fn test_strict() {
        let mut s = schema(vec![("a", Column::any().nullable())]);
        s.strict = true;
        let msgs = messages(ArrowSchemaValidator.validate(&frame(), &s, &ValidateOptions::default()));
        assert_eq!(msgs, vec!["column 'b' not in schema"]);
    }

    #[test]
    fn test_not_a_table() {
        let s = schema(vec![]);
        let msgs = messages(ArrowSchemaValidator.validate(&Value::Int(1), &s, &ValidateOptions::default()));
        assert_eq!(msgs, vec!["expected a table, got int"]);
    }
}
