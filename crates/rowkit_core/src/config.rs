//! ORM configuration.

use crate::naming::{IdentityNaming, NamingStrategy};
use std::sync::Arc;

/// Configuration for an [`crate::Orm`] instance.
#[derive(Debug, Clone)]
pub struct OrmConfig {
    /// Naming strategy used by models that do not declare their own.
    pub naming: Arc<dyn NamingStrategy>,

    /// Key under which the extras bag is serialized when a model opts in.
    pub extras_key: String,

    /// Whether batch upserts match text key values case-insensitively.
    pub case_insensitive_keys: bool,

    /// Page size used by `paginate` when none is given.
    pub default_per_page: u64,

    /// Column attribute used as primary key when a model flags none.
    pub default_primary_key: String,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            naming: Arc::new(IdentityNaming),
            extras_key: "meta".to_string(),
            case_insensitive_keys: true,
            default_per_page: 20,
            default_primary_key: "id".to_string(),
        }
    }
}

impl OrmConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default naming strategy.
    #[must_use]
    pub fn naming(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = naming;
        self
    }

    /// Sets the key used for the serialized extras bag.
    #[must_use]
    pub fn extras_key(mut self, key: impl Into<String>) -> Self {
        self.extras_key = key.into();
        self
    }

    /// Sets whether batch upserts compare text keys case-insensitively.
    #[must_use]
    pub fn case_insensitive_keys(mut self, value: bool) -> Self {
        self.case_insensitive_keys = value;
        self
    }

    /// Sets the default page size.
    #[must_use]
    pub fn default_per_page(mut self, per_page: u64) -> Self {
        self.default_per_page = per_page;
        self
    }

    /// Sets the default primary key attribute.
    #[must_use]
    pub fn default_primary_key(mut self, attribute: impl Into<String>) -> Self {
        self.default_primary_key = attribute.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SnakeCaseNaming;

    #[test]
    fn default_config() {
        let config = OrmConfig::default();
        assert_eq!(config.extras_key, "meta");
        assert!(config.case_insensitive_keys);
        assert_eq!(config.default_per_page, 20);
        assert_eq!(config.default_primary_key, "id");
        assert_eq!(config.naming.column_name("User", "firstName"), "firstName");
    }

    #[test]
    fn builder_pattern() {
        let config = OrmConfig::new()
            .naming(Arc::new(SnakeCaseNaming))
            .extras_key("$extras")
            .case_insensitive_keys(false)
            .default_per_page(50);

        assert_eq!(config.extras_key, "$extras");
        assert!(!config.case_insensitive_keys);
        assert_eq!(config.default_per_page, 50);
        assert_eq!(config.naming.column_name("User", "firstName"), "first_name");
    }
}
