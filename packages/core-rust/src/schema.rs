use serde::{Deserialize, Serialize};

/// Schema descriptor for a table, stored alongside its row count.
///
/// The storage layer records it verbatim and never validates rows against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schema version for compatibility checks between pipeline stages.
    pub version: u32,
    /// Field definitions, in column order.
    pub fields: Vec<FieldDef>,
    /// Name of the field that carries the record key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,
}

impl TableSchema {
    /// Schema with the given field names, all optional.
    #[must_use]
    pub fn with_fields<I, S>(version: u32, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version,
            fields: names
                .into_iter()
                .map(|name| FieldDef {
                    name: name.into(),
                    required: false,
                })
                .collect(),
            key_field: None,
        }
    }

    /// Field names in column order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Single field definition within a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Name of the field.
    pub name: String,
    /// Whether the field must be present in every record.
    pub required: bool,
}
