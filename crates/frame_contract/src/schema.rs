//! Table schemas, including columns whose names are only known at call time.
//!
//! A [`Schema`] lists columns by [`ColumnKey`]. A key is either a literal
//! column name or a [`from_arg`] placeholder naming a function argument; the
//! argument's value (one name or a list of names) decides which concrete
//! columns the schema requires for that call. See
//! [`SchemaResolver`](crate::resolver::SchemaResolver).

use crate::error::ConfigurationError;
use arrow::datatypes::DataType as ArrowDataType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Logical column type accepted by a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Int64,
    Float64,
    String,
    Binary,
    Date,
    Timestamp,
}

impl DataType {
    /// Whether an Arrow column of type `actual` satisfies this type.
    pub fn accepts(&self, actual: &ArrowDataType) -> bool {
        use ArrowDataType as A;

        match (self, actual) {
            (DataType::Boolean, A::Boolean) => true,
            (
                DataType::Int64,
                A::Int8 | A::Int16 | A::Int32 | A::Int64 | A::UInt8 | A::UInt16 | A::UInt32 | A::UInt64,
            ) => true,
            (DataType::Float64, A::Float16 | A::Float32 | A::Float64) => true,
            (DataType::String, A::Utf8 | A::LargeUtf8 | A::Utf8View) => true,
            (DataType::Binary, A::Binary | A::LargeBinary | A::BinaryView | A::FixedSizeBinary(_)) => {
                true
            }
            (DataType::Date, A::Date32 | A::Date64) => true,
            (DataType::Timestamp, A::Timestamp(_, _)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::String => "string",
            DataType::Binary => "binary",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let dt = match lower.as_str() {
            "bool" | "boolean" => DataType::Boolean,
            "int" | "integer" | "int8" | "int16" | "int32" | "int64" => DataType::Int64,
            "uint8" | "uint16" | "uint32" | "uint64" => DataType::Int64,
            "float" | "float32" | "float64" | "double" => DataType::Float64,
            "str" | "string" | "utf8" | "text" => DataType::String,
            "binary" | "bytes" => DataType::Binary,
            "date" | "date32" | "date64" => DataType::Date,
            "timestamp" | "datetime" | "datetime64" => DataType::Timestamp,
            _ => {
                return Err(ConfigurationError::InvalidSchema(format!(
                    "unsupported dtype string '{}'",
                    s.trim()
                )))
            }
        };
        Ok(dt)
    }
}

/// A column name, or a reference to the argument that supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
    Name(String),
    FromArg(String),
}

impl ColumnKey {
    /// The argument this key reads from, if it is a placeholder.
    pub fn argument(&self) -> Option<&str> {
        match self {
            ColumnKey::FromArg(arg) => Some(arg.as_str()),
            ColumnKey::Name(_) => None,
        }
    }
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        ColumnKey::Name(name.to_string())
    }
}

impl From<String> for ColumnKey {
    fn from(name: String) -> Self {
        ColumnKey::Name(name)
    }
}

/// Column placeholder resolved from argument `arg` at call time.
///
/// If the argument holds a string, the schema requires that one column; if
/// it holds a list of strings, every listed column gets the same requirements.
pub fn from_arg(arg: impl Into<String>) -> ColumnKey {
    ColumnKey::FromArg(arg.into())
}

/// Requirements on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Required type; `None` accepts any type.
    pub data_type: Option<DataType>,
    /// Whether nulls are allowed.
    pub nullable: bool,
    /// Whether the column must be present.
    pub required: bool,
}

impl Column {
    /// Any type, non-nullable, required.
    pub fn any() -> Self {
        Self {
            data_type: None,
            nullable: false,
            required: true,
        }
    }

    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::any()
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl Default for Column {
    fn default() -> Self {
        Self::any()
    }
}

/// Declared table schema. May contain [`from_arg`] placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<(ColumnKey, Column)>,
    strict: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, key: impl Into<ColumnKey>, column: Column) -> Self {
        self.columns.push((key.into(), column));
        self
    }

    /// Reject columns that the schema does not list.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn columns(&self) -> &[(ColumnKey, Column)] {
        &self.columns
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Arguments referenced by placeholders, in declaration order.
    pub fn referenced_arguments(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|(key, _)| key.argument())
            .collect()
    }

    pub fn is_dynamic(&self) -> bool {
        self.columns.iter().any(|(key, _)| key.argument().is_some())
    }

    /// Parse a schema definition.
    ///
    /// Accepts either an array of column objects or an object with a
    /// `columns` array and an optional `strict` flag. A column object names
    /// its column with `name` or `from_arg` and may set `dtype` (alias
    /// `data_type`/`type`), `nullable` and `required`.
    pub fn from_json(raw: &str) -> Result<Self, ConfigurationError> {
        let invalid = |msg: String| ConfigurationError::InvalidSchema(msg);

        let raw = raw.trim();
        if raw.is_empty() || raw == "null" {
            return Err(invalid("schema definition is empty".to_string()));
        }
        let value: JsonValue = serde_json::from_str(raw)
            .map_err(|e| invalid(format!("schema definition is not valid JSON: {}", e)))?;

        let (columns_value, strict) = match &value {
            JsonValue::Array(_) => (&value, false),
            JsonValue::Object(obj) => {
                let columns = obj
                    .get("columns")
                    .ok_or_else(|| invalid("schema object missing columns".to_string()))?;
                let strict = match obj.get("strict") {
                    None => false,
                    Some(v) => v
                        .as_bool()
                        .ok_or_else(|| invalid("strict must be a boolean".to_string()))?,
                };
                (columns, strict)
            }
            _ => {
                return Err(invalid(
                    "schema definition must be an array of columns or an object with columns"
                        .to_string(),
                ))
            }
        };

        let arr = columns_value
            .as_array()
            .ok_or_else(|| invalid("columns must be an array".to_string()))?;
        let mut schema = Schema::new().strict(strict);
        for col_value in arr {
            let (key, column) = column_from_value(col_value)?;
            schema = schema.column(key, column);
        }
        Ok(schema)
    }
}

fn column_from_value(value: &JsonValue) -> Result<(ColumnKey, Column), ConfigurationError> {
    let invalid = |msg: &str| ConfigurationError::InvalidSchema(msg.to_string());

    let obj = value
        .as_object()
        .ok_or_else(|| invalid("column must be an object"))?;

    let key = match (obj.get("name"), obj.get("from_arg")) {
        (Some(name), None) => ColumnKey::Name(
            name.as_str()
                .ok_or_else(|| invalid("column.name must be a string"))?
                .to_string(),
        ),
        (None, Some(arg)) => ColumnKey::FromArg(
            arg.as_str()
                .ok_or_else(|| invalid("column.from_arg must be a string"))?
                .to_string(),
        ),
        (Some(_), Some(_)) => return Err(invalid("column sets both name and from_arg")),
        (None, None) => return Err(invalid("column.name or column.from_arg is required")),
    };

    let data_type = match obj
        .get("dtype")
        .or_else(|| obj.get("data_type"))
        .or_else(|| obj.get("type"))
    {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(raw)) => Some(DataType::from_str(raw)?),
        Some(_) => return Err(invalid("column.dtype must be a string")),
    };

    let flag = |field: &str, default: bool| -> Result<bool, ConfigurationError> {
        match obj.get(field) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| {
                ConfigurationError::InvalidSchema(format!("column.{} must be a boolean", field))
            }),
        }
    };

    Ok((
        key,
        Column {
            data_type,
            nullable: flag("nullable", false)?,
            required: flag("required", true)?,
        },
    ))
}

/// A schema with every placeholder replaced by concrete column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSchema {
    pub columns: Vec<(String, Column)>,
    pub strict: bool,
}

impl ResolvedSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Insert or replace the requirements for `name`, keeping first-seen order.
    pub(crate) fn set(&mut self, name: String, column: Column) {
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = column,
            None => self.columns.push((name, column)),
        }
    }
}
