//! Error types for rowkit core.

use rowkit_value::ValueError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in rowkit core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Value conversion error.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// A key given to fill/merge/set matches no column, and extras were not allowed.
    #[error("cannot define \"{attribute}\" on \"{model}\" model, since it is not defined as a model property")]
    UnknownAttribute {
        /// Model the key was applied to.
        model: String,
        /// The rejected key.
        attribute: String,
    },

    /// A relation assignment does not match the declared cardinality.
    #[error("\"{model}.{relation}\" expects {expected}, received {received}")]
    CardinalityMismatch {
        /// Owner model name.
        model: String,
        /// Relation name.
        relation: String,
        /// Shape the relation accepts.
        expected: &'static str,
        /// Shape that was supplied.
        received: &'static str,
    },

    /// A lookup that must succeed found no row.
    #[error("row not found: \"{table}\" where \"{key}\" = {value}")]
    RowNotFound {
        /// Table that was searched.
        table: String,
        /// Column (or columns) used for the lookup.
        key: String,
        /// The looked-up value, rendered as text.
        value: String,
    },

    /// A batch upsert row does not carry a value for one of the unique keys.
    #[error("value for the \"{attribute}\" unique key is undefined or null in row {row} of the \"{model}\" batch")]
    MissingKeyValue {
        /// Model of the batch.
        model: String,
        /// Key attribute that was missing.
        attribute: String,
        /// Zero-based index of the offending row.
        row: usize,
    },

    /// A value cannot be converted to the column's declared type.
    #[error("invalid value for \"{model}.{attribute}\": {message}")]
    InvalidColumnValue {
        /// Model name.
        model: String,
        /// Attribute name.
        attribute: String,
        /// Description of the problem.
        message: String,
    },

    /// A hook aborted the operation.
    #[error("hook aborted: {message}")]
    HookAbort {
        /// Reason given by the hook.
        message: String,
    },

    /// An error raised by user code (hooks, accessors) with its own type.
    #[error(transparent)]
    External(Box<dyn std::error::Error + Send + Sync>),

    /// No model with this name has been defined.
    #[error("unknown model: {name}")]
    UnknownModel {
        /// Requested model name.
        name: String,
    },

    /// The model declares no relation with this name.
    #[error("\"{relation}\" is not defined as a relationship on \"{model}\" model")]
    UnknownRelation {
        /// Owner model name.
        model: String,
        /// Requested relation name.
        relation: String,
    },

    /// A related instance is of the wrong model type.
    #[error("\"{model}.{relation}\" expects instances of \"{expected}\", received \"{received}\"")]
    RelatedTypeMismatch {
        /// Owner model name.
        model: String,
        /// Relation name.
        relation: String,
        /// Declared related model.
        expected: String,
        /// Model of the supplied instance.
        received: String,
    },

    /// The instance was deleted and can no longer be mutated or persisted.
    #[error("cannot mutate deleted \"{model}\" instance")]
    DeletedInstance {
        /// Model name.
        model: String,
    },

    /// The operation needs a primary key value and the instance has none.
    #[error("\"{model}\" instance has no primary key value")]
    MissingPrimaryKey {
        /// Model name.
        model: String,
    },

    /// The transaction was already committed or rolled back.
    #[error("transaction {id} is already completed")]
    TransactionCompleted {
        /// Transaction identifier.
        id: u64,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The storage adapter failed.
    #[error("adapter error: {message}")]
    Adapter {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown attribute error.
    pub fn unknown_attribute(model: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            model: model.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates a row not found error.
    pub fn row_not_found(
        table: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::RowNotFound {
            table: table.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates an invalid column value error.
    pub fn invalid_column_value(
        model: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidColumnValue {
            model: model.into(),
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Creates a hook abort error. Hooks return this to stop an operation.
    pub fn hook_abort(message: impl Into<String>) -> Self {
        Self::HookAbort {
            message: message.into(),
        }
    }

    /// Wraps an arbitrary error raised by user code.
    pub fn external(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::External(Box::new(err))
    }

    /// Creates an unknown model error.
    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel { name: name.into() }
    }

    /// Creates an unknown relation error.
    pub fn unknown_relation(model: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            model: model.into(),
            relation: relation.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an adapter error.
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
        }
    }

    /// Returns true for lookups that found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RowNotFound { .. })
    }
}
