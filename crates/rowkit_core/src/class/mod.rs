//! Type-level operations.
//!
//! A [`ModelClass`] is a booted model type paired with the ORM and an
//! optional client. Everything it creates or reads is bound to that client.

mod upsert;

use crate::adapter::{ManagedTransaction, QueryClient, Row, TransactionHandle};
use crate::error::{CoreError, CoreResult};
use crate::model::Model;
use crate::orm::Orm;
use crate::query::ModelQuery;
use crate::registry::ModelType;
use crate::types::SortDirection;
use rowkit_value::{Value, ValueMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Handle for a booted model type.
#[derive(Clone)]
pub struct ModelClass {
    orm: Orm,
    ty: Arc<ModelType>,
    client: Option<QueryClient>,
}

impl ModelClass {
    pub(crate) fn new(orm: Orm, ty: Arc<ModelType>, client: Option<QueryClient>) -> Self {
        Self { orm, ty, client }
    }

    /// The booted type.
    pub fn model_type(&self) -> &Arc<ModelType> {
        &self.ty
    }

    /// Model name.
    pub fn name(&self) -> &str {
        self.ty.name()
    }

    /// The client used by this handle.
    pub fn client(&self) -> Option<&QueryClient> {
        self.client.as_ref().filter(|client| !client.is_completed())
    }

    /// Returns a handle whose operations run inside `trx`.
    #[must_use]
    pub fn use_transaction(mut self, trx: TransactionHandle) -> Self {
        self.client = Some(QueryClient::Transaction(trx));
        self
    }

    /// Returns a handle whose operations run on a named connection.
    #[must_use]
    pub fn use_connection(mut self, name: impl Into<String>) -> Self {
        self.client = Some(QueryClient::Connection(name.into()));
        self
    }

    /// A new local instance bound to this handle's client.
    pub fn new_instance(&self) -> Model {
        let mut model = Model::new(self.orm.clone(), Arc::clone(&self.ty));
        model.bind_client(self.client().cloned());
        model
    }

    /// Builds a persisted instance from a column-keyed row without
    /// touching storage.
    pub fn hydrate(&self, row: Row) -> CoreResult<Model> {
        Model::from_row(
            self.orm.clone(),
            Arc::clone(&self.ty),
            row,
            self.client().cloned(),
            ValueMap::new(),
        )
    }

    /// A query over this type.
    pub fn query(&self) -> ModelQuery {
        ModelQuery::new(self.orm.clone(), Arc::clone(&self.ty), self.client().cloned())
    }

    /// Begins a transaction on this handle's connection.
    pub async fn transaction(&self) -> CoreResult<TransactionHandle> {
        let connection = match self.client() {
            Some(QueryClient::Connection(name)) => Some(name.as_str()),
            Some(QueryClient::Transaction(trx)) => trx.connection(),
            None => None,
        };
        let trx = self.orm.adapter().begin_transaction(connection).await?;
        debug!(model = %self.ty.name(), trx = %trx.id(), "began transaction");
        Ok(trx)
    }

    /// Creates and saves one instance.
    pub async fn create(&self, values: ValueMap) -> CoreResult<Model> {
        let mut model = self.new_instance();
        model.merge(values, false)?;
        model.save().await?;
        Ok(model)
    }

    /// Creates several instances inside one transaction.
    ///
    /// Uses the bound transaction when there is one; otherwise opens a
    /// transaction that is rolled back if any row fails.
    pub async fn create_many(&self, rows: Vec<ValueMap>) -> CoreResult<Vec<Model>> {
        let managed = ManagedTransaction::open(self.orm.adapter().as_ref(), self.client()).await?;
        let class = self.clone().use_transaction(Arc::clone(managed.handle()));
        let result = async {
            let mut created = Vec::with_capacity(rows.len());
            for values in rows {
                created.push(class.create(values).await?);
            }
            Ok::<_, CoreError>(created)
        }
        .await;
        managed.finish(result).await
    }

    /// Finds by primary key.
    pub async fn find(&self, value: impl Into<Value>) -> CoreResult<Option<Model>> {
        self.query()
            .where_eq(self.ty.primary_key(), value)
            .first()
            .await
    }

    /// Finds by primary key or fails with [`CoreError::RowNotFound`].
    pub async fn find_or_fail(&self, value: impl Into<Value>) -> CoreResult<Model> {
        let value = value.into();
        self.find(value.clone()).await?.ok_or_else(|| {
            CoreError::row_not_found(
                self.ty.table(),
                self.ty.primary_column(),
                value.key_string(),
            )
        })
    }

    /// Finds the first instance whose `attribute` equals `value`.
    pub async fn find_by(
        &self,
        attribute: &str,
        value: impl Into<Value>,
    ) -> CoreResult<Option<Model>> {
        self.query().where_eq(attribute, value).first().await
    }

    /// Like [`ModelClass::find_by`], failing when nothing matches.
    pub async fn find_by_or_fail(
        &self,
        attribute: &str,
        value: impl Into<Value>,
    ) -> CoreResult<Model> {
        self.query().where_eq(attribute, value).first_or_fail().await
    }

    /// Finds several instances by primary key, newest key first.
    pub async fn find_many<I, V>(&self, values: I) -> CoreResult<Vec<Model>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let primary_key = self.ty.primary_key();
        self.query()
            .where_in(primary_key, values)
            .order_by(primary_key, SortDirection::Desc)
            .fetch()
            .await
    }

    /// Every instance whose `attribute` equals `value`.
    pub async fn find_many_by(
        &self,
        attribute: &str,
        value: impl Into<Value>,
    ) -> CoreResult<Vec<Model>> {
        self.query().where_eq(attribute, value).fetch().await
    }

    /// The first row of the table.
    pub async fn first(&self) -> CoreResult<Option<Model>> {
        self.query().first().await
    }

    /// The first row of the table or [`CoreError::RowNotFound`].
    pub async fn first_or_fail(&self) -> CoreResult<Model> {
        self.query().first_or_fail().await
    }

    /// Every row of the table, newest key first.
    pub async fn all(&self) -> CoreResult<Vec<Model>> {
        self.query()
            .order_by(self.ty.primary_key(), SortDirection::Desc)
            .fetch()
            .await
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("model", &self.ty.name())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
