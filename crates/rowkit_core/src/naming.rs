//! Naming strategies.
//!
//! A naming strategy maps model and attribute names to table names, column
//! names, serialized names and relation keys. It is consulted once per
//! declaration at boot time; explicit names given in a declaration always
//! win over the strategy.

use crate::registry::RelationKind;
use convert_case::{Case, Casing};
use std::fmt;

/// Keys used for pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationMetaKeys {
    /// Total number of rows.
    pub total: String,
    /// Rows per page.
    pub per_page: String,
    /// Current page number.
    pub current_page: String,
    /// Last page number.
    pub last_page: String,
    /// First page number.
    pub first_page: String,
}

/// Maps declared names to storage and serialized names.
pub trait NamingStrategy: fmt::Debug + Send + Sync {
    /// Table name for a model.
    fn table_name(&self, model: &str) -> String {
        model.to_case(Case::Snake)
    }

    /// Storage column name for an attribute.
    fn column_name(&self, model: &str, attribute: &str) -> String;

    /// Serialized name for an attribute.
    fn serialized_name(&self, model: &str, attribute: &str) -> String;

    /// Serialized name for a relation.
    fn relation_serialized_name(&self, model: &str, relation: &str) -> String;

    /// Attribute holding the local key of a relation.
    ///
    /// For `BelongsTo` this lives on the related model, for every other
    /// kind on the owner.
    fn relation_local_key(
        &self,
        kind: RelationKind,
        owner_primary_key: &str,
        related_primary_key: &str,
    ) -> String {
        match kind {
            RelationKind::BelongsTo => related_primary_key.to_string(),
            _ => owner_primary_key.to_string(),
        }
    }

    /// Attribute holding the foreign key of a relation.
    ///
    /// For `BelongsTo` this lives on the owner, for every other kind on the
    /// related model.
    fn relation_foreign_key(
        &self,
        kind: RelationKind,
        owner: (&str, &str),
        related: (&str, &str),
    ) -> String;

    /// Keys used when rendering pagination metadata.
    fn pagination_meta_keys(&self) -> PaginationMetaKeys;
}

/// Keeps attribute names unchanged for columns and serialized output.
///
/// Relation foreign keys are camel cased (`userId`), matching attributes
/// that are themselves camel cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNaming;

impl NamingStrategy for IdentityNaming {
    fn column_name(&self, _model: &str, attribute: &str) -> String {
        attribute.to_string()
    }

    fn serialized_name(&self, _model: &str, attribute: &str) -> String {
        attribute.to_string()
    }

    fn relation_serialized_name(&self, _model: &str, relation: &str) -> String {
        relation.to_string()
    }

    fn relation_foreign_key(
        &self,
        kind: RelationKind,
        owner: (&str, &str),
        related: (&str, &str),
    ) -> String {
        let (model, primary_key) = foreign_key_source(kind, owner, related);
        format!("{model}_{primary_key}").to_case(Case::Camel)
    }

    fn pagination_meta_keys(&self) -> PaginationMetaKeys {
        PaginationMetaKeys {
            total: "total".into(),
            per_page: "perPage".into(),
            current_page: "currentPage".into(),
            last_page: "lastPage".into(),
            first_page: "firstPage".into(),
        }
    }
}

/// Snake cases column names, serialized names and relation keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCaseNaming;

impl NamingStrategy for SnakeCaseNaming {
    fn column_name(&self, _model: &str, attribute: &str) -> String {
        attribute.to_case(Case::Snake)
    }

    fn serialized_name(&self, _model: &str, attribute: &str) -> String {
        attribute.to_case(Case::Snake)
    }

    fn relation_serialized_name(&self, _model: &str, relation: &str) -> String {
        relation.to_case(Case::Snake)
    }

    fn relation_foreign_key(
        &self,
        kind: RelationKind,
        owner: (&str, &str),
        related: (&str, &str),
    ) -> String {
        let (model, primary_key) = foreign_key_source(kind, owner, related);
        format!("{model}_{primary_key}").to_case(Case::Snake)
    }

    fn pagination_meta_keys(&self) -> PaginationMetaKeys {
        PaginationMetaKeys {
            total: "total".into(),
            per_page: "per_page".into(),
            current_page: "current_page".into(),
            last_page: "last_page".into(),
            first_page: "first_page".into(),
        }
    }
}

fn foreign_key_source<'a>(
    kind: RelationKind,
    owner: (&'a str, &'a str),
    related: (&'a str, &'a str),
) -> (&'a str, &'a str) {
    match kind {
        RelationKind::BelongsTo => related,
        _ => owner,
    }
}
