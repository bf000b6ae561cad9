pub mod registry;
pub mod serializer;

pub use registry::{HttpSchemaRegistry, SchemaRegistry};
pub use serializer::{
    decode_confluent, parse_schema, subject_name, SchemaBinding, SubjectKind, MAGIC_BYTE,
};
