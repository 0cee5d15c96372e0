//! Bidirectional name maps for a booted model type.

use super::model_type::ColumnDefinition;
use std::collections::BTreeMap;

/// Maps attribute names to column names and serialized names, and back.
///
/// Suppressed (hidden) columns have no serialized entry.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    attributes_to_columns: BTreeMap<String, String>,
    columns_to_attributes: BTreeMap<String, String>,
    attributes_to_serialized: BTreeMap<String, String>,
    serialized_to_attributes: BTreeMap<String, String>,
}

impl KeyResolver {
    pub(crate) fn from_columns<'a>(columns: impl IntoIterator<Item = &'a ColumnDefinition>) -> Self {
        let mut keys = Self::default();
        for column in columns {
            let attribute = column.attribute().to_string();
            keys.attributes_to_columns
                .insert(attribute.clone(), column.column_name().to_string());
            keys.columns_to_attributes
                .insert(column.column_name().to_string(), attribute.clone());
            if let Some(serialized) = column.serialized_name() {
                keys.attributes_to_serialized
                    .insert(attribute.clone(), serialized.to_string());
                keys.serialized_to_attributes
                    .insert(serialized.to_string(), attribute);
            }
        }
        keys
    }

    /// Column name for an attribute.
    pub fn column_for(&self, attribute: &str) -> Option<&str> {
        self.attributes_to_columns.get(attribute).map(String::as_str)
    }

    /// Attribute name for a column.
    pub fn attribute_for_column(&self, column: &str) -> Option<&str> {
        self.columns_to_attributes.get(column).map(String::as_str)
    }

    /// Serialized name for an attribute, `None` when suppressed or unknown.
    pub fn serialized_for(&self, attribute: &str) -> Option<&str> {
        self.attributes_to_serialized.get(attribute).map(String::as_str)
    }

    /// Attribute name for a serialized name.
    pub fn attribute_for_serialized(&self, serialized: &str) -> Option<&str> {
        self.serialized_to_attributes.get(serialized).map(String::as_str)
    }
}
