use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Nanoseconds per second; record timestamps are nanoseconds.
pub const NS_PER_S: f64 = 1_000_000_000.0;

/// Number of positional columns every CSV data row must carry.
pub const CSV_REQUIRED_COLUMNS: usize = 5;

/// Primitive measurement value carried by a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Coerce a raw CSV cell: integer, then float, then boolean, then text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Value::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return Value::Float(value);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        Value::Text(trimmed.to_string())
    }

    /// Convert a JSON scalar. Objects, arrays and null are not primitives.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(flag) => Some(Value::Bool(*flag)),
            JsonValue::Number(number) => number
                .as_i64()
                .map(Value::Int)
                .or_else(|| number.as_f64().map(Value::Float)),
            JsonValue::String(text) => Some(Value::Text(text.clone())),
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            Value::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            Value::Bool(flag) => Some(i64::from(*flag)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Text(text) => write!(f, "{text}"),
        }
    }
}

/// One normalized measurement point.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub suite_id: String,
    pub operation_id: String,
    pub field: String,
    /// Nanoseconds, monotonic within a run.
    pub timestamp: i64,
    pub value: Value,
    pub custom_fields: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    pub fn new(
        suite_id: impl Into<String>,
        operation_id: impl Into<String>,
        field: impl Into<String>,
        timestamp: i64,
        value: Value,
    ) -> Self {
        Self {
            suite_id: suite_id.into(),
            operation_id: operation_id.into(),
            field: field.into(),
            timestamp,
            value,
            custom_fields: BTreeMap::new(),
        }
    }

    /// Look up a custom field by dotted key (e.g. `buffer_storage.status`).
    pub fn custom_field(&self, key: &str) -> Option<&Value> {
        self.custom_fields.get(key)
    }

    pub fn seconds(&self) -> f64 {
        self.timestamp as f64 / NS_PER_S
    }

    /// Normalize a CSV data row. `header` names the extra columns past `value`.
    pub fn from_csv_row(row: &StringRecord, header: &[String]) -> Result<Self> {
        if row.len() < CSV_REQUIRED_COLUMNS {
            bail!(
                "expected at least {CSV_REQUIRED_COLUMNS} columns, found {}",
                row.len()
            );
        }

        let suite_id = row[0].trim();
        if suite_id.is_empty() {
            bail!("empty suite id");
        }
        let timestamp = row[1]
            .trim()
            .parse::<i64>()
            .with_context(|| format!("timestamp '{}' is not an integer", &row[1]))?;

        let mut record = Self::new(
            suite_id,
            row[2].trim(),
            row[3].trim(),
            timestamp,
            Value::parse(&row[4]),
        );

        for (position, cell) in row.iter().enumerate().skip(CSV_REQUIRED_COLUMNS) {
            if cell.trim().is_empty() {
                continue;
            }
            let key = header
                .get(position)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("column_{position}"));
            record.custom_fields.insert(key, Value::parse(cell));
        }

        Ok(record)
    }

    /// Normalize one JSON data line.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let datum: JsonDatum = serde_json::from_str(line).context("malformed JSON record")?;

        let mut custom_fields = BTreeMap::new();
        if let Some(custom) = &datum.custom {
            flatten_custom("", custom, &mut custom_fields);
        }

        let (field, value) = match (datum.field, datum.value) {
            (Some(field), Some(raw)) => {
                let value = Value::from_json(&raw)
                    .ok_or_else(|| anyhow!("value for field '{field}' is not a primitive"))?;
                (field, value)
            }
            (Some(field), None) => {
                let value = custom_fields
                    .get(&field)
                    .cloned()
                    .ok_or_else(|| anyhow!("field '{field}' carries no value"))?;
                (field, value)
            }
            (None, Some(_)) => bail!("value given without a field name"),
            (None, None) => custom_fields
                .iter()
                .next()
                .map(|(key, value)| (key.clone(), value.clone()))
                .ok_or_else(|| anyhow!("record carries no measurement"))?,
        };

        Ok(Self {
            suite_id: datum.suite_id,
            operation_id: datum.operation_id,
            field,
            timestamp: datum.timestamp,
            value,
            custom_fields,
        })
    }
}

#[derive(Debug, Deserialize)]
struct JsonDatum {
    suite_id: String,
    operation_id: String,
    timestamp: i64,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    value: Option<JsonValue>,
    #[serde(default)]
    custom: Option<Map<String, JsonValue>>,
}

fn flatten_custom(
    prefix: &str,
    object: &Map<String, JsonValue>,
    out: &mut BTreeMap<String, Value>,
) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            JsonValue::Object(nested) => flatten_custom(&path, nested, out),
            other => {
                if let Some(value) = Value::from_json(other) {
                    out.insert(path, value);
                }
            }
        }
    }
}

/// Metadata describing the device and OS build a report was captured on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default, alias = "DEVICE")]
    pub device: Option<String>,
    #[serde(default, alias = "MANUFACTURER")]
    pub manufacturer: Option<String>,
    #[serde(default, alias = "MODEL")]
    pub model: Option<String>,
    #[serde(default, alias = "FINGERPRINT")]
    pub fingerprint: Option<String>,
    #[serde(default, alias = "SDK_INT")]
    pub sdk_int: Option<i64>,
    #[serde(default, alias = "SUPPORTED_ABIS")]
    pub abis: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl BuildInfo {
    /// Parse the first line of a JSON report. Accepts a bare object or one
    /// nested under `"build"`.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let raw: JsonValue = serde_json::from_str(line).context("malformed build info")?;
        let JsonValue::Object(mut object) = raw else {
            bail!("build info must be a JSON object");
        };
        let payload = match object.remove("build") {
            Some(JsonValue::Object(nested)) => JsonValue::Object(nested),
            Some(other) => {
                object.insert("build".into(), other);
                JsonValue::Object(object)
            }
            None => JsonValue::Object(object),
        };
        serde_json::from_value(payload).context("unexpected build info shape")
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(manufacturer) = &self.manufacturer {
            parts.push(manufacturer.clone());
        }
        if let Some(model) = &self.model {
            parts.push(model.clone());
        }
        if let Some(device) = &self.device {
            parts.push(format!("({device})"));
        }
        if let Some(sdk) = self.sdk_int {
            parts.push(format!("sdk {sdk}"));
        }
        if parts.is_empty() {
            "unknown device".into()
        } else {
            parts.join(" ")
        }
    }
}
