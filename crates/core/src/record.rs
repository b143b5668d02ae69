//! The incident record: a fixed, positional row of thirteen string values.
//!
//! The order of [`Field::ALL`] is the wire contract. A record serializes as a
//! JSON array, never as an object with named keys, and the backend stores it
//! as one spreadsheet row in the same order.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};

/// Number of columns in a record.
pub const FIELD_COUNT: usize = 13;

/// One column of the record, in wire order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Timestamp,
    Department,
    InchargeName,
    Date,
    Time,
    MachineNo,
    LineNo,
    MachineType,
    NeedleType,
    Supervisor,
    Operator,
    ImageLink,
    Remarks,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Timestamp,
        Field::Department,
        Field::InchargeName,
        Field::Date,
        Field::Time,
        Field::MachineNo,
        Field::LineNo,
        Field::MachineType,
        Field::NeedleType,
        Field::Supervisor,
        Field::Operator,
        Field::ImageLink,
        Field::Remarks,
    ];

    /// Position of this field in the row.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column title used in the header row of the sheet.
    pub fn header(self) -> &'static str {
        match self {
            Field::Timestamp => "Timestamp",
            Field::Department => "Department",
            Field::InchargeName => "Incharge Name",
            Field::Date => "Date",
            Field::Time => "Time",
            Field::MachineNo => "Machine No.",
            Field::LineNo => "Line No.",
            Field::MachineType => "Machine Type",
            Field::NeedleType => "Needle Type",
            Field::Supervisor => "Supervisor",
            Field::Operator => "Operator",
            Field::ImageLink => "Image Link",
            Field::Remarks => "Remarks",
        }
    }

    /// camelCase key, used where a field is named rather than positioned.
    pub fn key(self) -> &'static str {
        match self {
            Field::Timestamp => "timestamp",
            Field::Department => "department",
            Field::InchargeName => "inchargeName",
            Field::Date => "date",
            Field::Time => "time",
            Field::MachineNo => "machineNo",
            Field::LineNo => "lineNo",
            Field::MachineType => "machineType",
            Field::NeedleType => "needleType",
            Field::Supervisor => "supervisor",
            Field::Operator => "operator",
            Field::ImageLink => "imageLink",
            Field::Remarks => "remarks",
        }
    }

    /// The header row of the sheet.
    pub fn headers() -> [&'static str; FIELD_COUNT] {
        Field::ALL.map(Field::header)
    }
}

/// Render a timestamp the way records carry it: ISO-8601, UTC, milliseconds.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A logged needle-break incident.
///
/// Immutable once built; a new record is built per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentRecord {
    values: [String; FIELD_COUNT],
}

impl IncidentRecord {
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    pub fn from_values(values: [String; FIELD_COUNT]) -> Self {
        Self { values }
    }

    /// Build a record from a positional row.
    ///
    /// Short rows are padded with empty strings; rows wider than
    /// [`FIELD_COUNT`] are rejected.
    pub fn from_row(row: Vec<String>) -> DomainResult<Self> {
        if row.len() > FIELD_COUNT {
            return Err(DomainError::malformed_row(format!(
                "expected at most {FIELD_COUNT} values, got {}",
                row.len()
            )));
        }

        let mut values: [String; FIELD_COUNT] = Default::default();
        for (slot, value) in values.iter_mut().zip(row) {
            *slot = value;
        }
        Ok(Self { values })
    }

    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    pub fn values(&self) -> &[String; FIELD_COUNT] {
        &self.values
    }

    pub fn into_values(self) -> [String; FIELD_COUNT] {
        self.values
    }

    pub fn date(&self) -> &str {
        self.get(Field::Date)
    }
}

/// Collects field values and produces an [`IncidentRecord`].
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    values: [String; FIELD_COUNT],
}

impl RecordBuilder {
    pub fn field(mut self, field: Field, value: impl Into<String>) -> Self {
        self.values[field.index()] = value.into();
        self
    }

    pub fn timestamp(self, at: DateTime<Utc>) -> Self {
        self.field(Field::Timestamp, iso_timestamp(at))
    }

    pub fn build(self) -> IncidentRecord {
        IncidentRecord { values: self.values }
    }
}

impl Serialize for IncidentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(FIELD_COUNT))?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for IncidentRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        let mut row = Vec::with_capacity(raw.len());
        for (i, value) in raw.into_iter().enumerate() {
            row.push(cell_to_string(value).ok_or_else(|| {
                de::Error::custom(format!("value at position {i} is not a scalar"))
            })?);
        }
        IncidentRecord::from_row(row).map_err(de::Error::custom)
    }
}

fn cell_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
