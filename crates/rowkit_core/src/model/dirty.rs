//! Dirty tracking.

use super::Model;
use rowkit_value::{deep_eq, Value, ValueMap};

impl Model {
    /// Attributes that differ from the original snapshot.
    ///
    /// A key absent from the original is always dirty. Otherwise values are
    /// compared structurally, so re-assigning an equal date or list does
    /// not count as a change. After a fill, originals that were dropped
    /// report as dirty with a null value.
    pub fn dirty(&self) -> ValueMap {
        let mut dirty: ValueMap = self
            .attributes
            .iter()
            .filter(|(key, value)| {
                self.original
                    .get(*key)
                    .map_or(true, |original| !deep_eq(original, value))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if self.fill_invoked {
            for key in self.original.keys() {
                if !self.attributes.contains_key(key) {
                    dirty.insert(key.clone(), Value::Null);
                }
            }
        }
        dirty
    }

    /// Whether any attribute is dirty.
    pub fn is_dirty(&self) -> bool {
        !self.dirty().is_empty()
    }

    /// Whether one attribute is dirty.
    pub fn is_attribute_dirty(&self, attribute: &str) -> bool {
        self.dirty().contains_key(attribute)
    }
}
