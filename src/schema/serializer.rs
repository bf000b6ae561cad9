use crate::{Error, Result};
use apache_avro::types::Value;
use apache_avro::Schema;
use serde::Serialize;

/// First byte of every Confluent-framed message.
pub const MAGIC_BYTE: u8 = 0;

const HEADER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Key,
    Value,
}

/// Registry subject for a topic, following the topic-name strategy.
pub fn subject_name(topic: &str, kind: SubjectKind) -> String {
    match kind {
        SubjectKind::Key => format!("{}-key", topic),
        SubjectKind::Value => format!("{}-value", topic),
    }
}

pub fn parse_schema(raw: &str) -> Result<Schema> {
    Schema::parse_str(raw).map_err(|e| Error::Config(format!("invalid Avro schema: {}", e)))
}

/// A parsed schema together with the id the registry assigned to it.
#[derive(Debug, Clone)]
pub struct SchemaBinding {
    pub subject: String,
    pub schema: Schema,
    pub id: u32,
}

impl SchemaBinding {
    /// Serializes `value` against the bound schema and frames it as
    /// `[magic][id: u32 BE][avro datum]`.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let value = apache_avro::to_value(value)?;
        check_int_ranges(&value, &self.schema)?;
        let resolved = value.resolve(&self.schema)?;
        let datum = apache_avro::to_avro_datum(&self.schema, resolved)?;

        let mut buf = Vec::with_capacity(HEADER_LEN + datum.len());
        buf.push(MAGIC_BYTE);
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&datum);
        Ok(buf)
    }
}

/// Rejects 64-bit integers bound for `int` positions that they do not fit.
///
/// Resolution narrows `long` to `int` with a plain cast, so without this check
/// an out-of-range number would be written as a different, wrapped value.
fn check_int_ranges(value: &Value, schema: &Schema) -> Result<()> {
    match (value, schema) {
        (Value::Long(n), Schema::Int) if i32::try_from(*n).is_err() => Err(Error::Schema(
            format!("{} is out of range for Avro int", n),
        )),
        (Value::Union(_, inner), _) => check_int_ranges(inner, schema),
        (_, Schema::Union(union)) => {
            let mut last_err = None;
            for variant in union.variants().iter().filter(|v| same_shape(value, v)) {
                match check_int_ranges(value, variant) {
                    Ok(()) => return Ok(()),
                    Err(e) => last_err = Some(e),
                }
            }
            last_err.map_or(Ok(()), Err)
        }
        (Value::Record(fields), Schema::Record(record)) => {
            for (name, field_value) in fields {
                if let Some(field) = record.fields.iter().find(|f| &f.name == name) {
                    check_int_ranges(field_value, &field.schema)?;
                }
            }
            Ok(())
        }
        (Value::Map(items), Schema::Record(record)) => {
            for field in &record.fields {
                if let Some(field_value) = items.get(&field.name) {
                    check_int_ranges(field_value, &field.schema)?;
                }
            }
            Ok(())
        }
        (Value::Map(items), Schema::Map(map)) => items
            .values()
            .try_for_each(|item| check_int_ranges(item, &map.types)),
        (Value::Array(items), Schema::Array(array)) => items
            .iter()
            .try_for_each(|item| check_int_ranges(item, &array.items)),
        _ => Ok(()),
    }
}

/// Whether `schema` is a union branch `value` could resolve to.
fn same_shape(value: &Value, schema: &Schema) -> bool {
    match value {
        Value::Long(_) | Value::Int(_) => matches!(
            schema,
            Schema::Int | Schema::Long | Schema::Float | Schema::Double
        ),
        Value::Record(_) | Value::Map(_) => matches!(schema, Schema::Record(_) | Schema::Map(_)),
        Value::Array(_) => matches!(schema, Schema::Array(_)),
        _ => true,
    }
}

/// Splits a Confluent-framed message into its schema id and decoded datum.
pub fn decode_confluent(bytes: &[u8], schema: &Schema) -> Result<(u32, Value)> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Schema(format!(
            "message too short for wire format: {} bytes",
            bytes.len()
        )));
    }
    if bytes[0] != MAGIC_BYTE {
        return Err(Error::Schema(format!("unknown magic byte {}", bytes[0])));
    }

    let id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let mut reader = &bytes[HEADER_LEN..];
    let value = apache_avro::from_avro_datum(schema, &mut reader, None)?;
    Ok((id, value))
}
