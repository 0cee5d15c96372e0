//! Model queries.
//!
//! A [`ModelQuery`] filters by attribute names, which are mapped to
//! column names when the query is compiled. Reads hydrate persisted
//! instances and fire the model's find, fetch or paginate hooks.

mod page;

pub use page::Page;

use crate::adapter::{Operator, Predicate, QueryClient, QuerySpec, TransactionHandle};
use crate::error::{CoreError, CoreResult};
use crate::hooks::{
    run_model_hooks, run_models_hooks, run_page_hooks, run_paginate_hooks, run_query_hooks,
    HookEvent,
};
use crate::model::Model;
use crate::orm::Orm;
use crate::registry::ModelType;
use crate::types::SortDirection;
use rowkit_value::{Value, ValueMap};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A query over one model type.
#[derive(Clone)]
pub struct ModelQuery {
    orm: Orm,
    ty: Arc<ModelType>,
    predicates: Vec<Predicate>,
    order_by: Vec<(String, SortDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
    for_update: bool,
    client: Option<QueryClient>,
    sideload: ValueMap,
    hooks: bool,
}

impl ModelQuery {
    pub(crate) fn new(orm: Orm, ty: Arc<ModelType>, client: Option<QueryClient>) -> Self {
        Self {
            orm,
            ty,
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            for_update: false,
            client,
            sideload: ValueMap::new(),
            hooks: true,
        }
    }

    /// The queried model type.
    pub fn model_type(&self) -> &Arc<ModelType> {
        &self.ty
    }

    /// Filters added so far, with column names.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// The client the query runs on.
    pub fn client_ref(&self) -> Option<&QueryClient> {
        self.client.as_ref()
    }

    fn column(&self, attribute: &str) -> String {
        self.ty
            .keys()
            .column_for(attribute)
            .unwrap_or(attribute)
            .to_string()
    }

    /// Adds a raw predicate. Column names are used as given.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// `attribute = value`. A null value filters for null.
    #[must_use]
    pub fn where_eq(self, attribute: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_nullish() {
            return self.where_null(attribute);
        }
        self.where_op(attribute, Operator::Eq, value)
    }

    /// `attribute <> value`.
    #[must_use]
    pub fn where_not(self, attribute: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_nullish() {
            return self.where_not_null(attribute);
        }
        self.where_op(attribute, Operator::NotEq, value)
    }

    /// `attribute <op> value`.
    #[must_use]
    pub fn where_op(mut self, attribute: &str, op: Operator, value: impl Into<Value>) -> Self {
        let column = self.column(attribute);
        self.predicates.push(Predicate::Compare {
            column,
            op,
            value: value.into(),
        });
        self
    }

    /// `attribute IN (values)`.
    #[must_use]
    pub fn where_in<I, V>(mut self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = self.column(attribute);
        self.predicates.push(Predicate::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// `attribute IS NULL`.
    #[must_use]
    pub fn where_null(mut self, attribute: &str) -> Self {
        let column = self.column(attribute);
        self.predicates.push(Predicate::IsNull { column });
        self
    }

    /// `attribute IS NOT NULL`.
    #[must_use]
    pub fn where_not_null(mut self, attribute: &str) -> Self {
        let column = self.column(attribute);
        self.predicates.push(Predicate::NotNull { column });
        self
    }

    /// Equality on every entry of `values`.
    #[must_use]
    pub fn where_all(self, values: &ValueMap) -> Self {
        values
            .iter()
            .fold(self, |query, (attribute, value)| {
                query.where_eq(attribute, value.clone())
            })
    }

    /// Orders by an attribute.
    #[must_use]
    pub fn order_by(mut self, attribute: &str, direction: SortDirection) -> Self {
        let column = self.column(attribute);
        self.order_by.push((column, direction));
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips rows.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Locks matched rows until the transaction completes.
    #[must_use]
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// Runs inside a transaction.
    #[must_use]
    pub fn use_transaction(mut self, trx: TransactionHandle) -> Self {
        self.client = Some(QueryClient::Transaction(trx));
        self
    }

    /// Runs on a named connection.
    #[must_use]
    pub fn use_connection(mut self, name: impl Into<String>) -> Self {
        self.client = Some(QueryClient::Connection(name.into()));
        self
    }

    /// Replaces the client.
    #[must_use]
    pub fn client(mut self, client: Option<QueryClient>) -> Self {
        self.client = client;
        self
    }

    /// Attaches values to every hydrated instance as sideloaded data.
    #[must_use]
    pub fn sideload(mut self, values: ValueMap) -> Self {
        self.sideload = values;
        self
    }

    /// Skips find/fetch/paginate hooks.
    #[must_use]
    pub(crate) fn without_hooks(mut self) -> Self {
        self.hooks = false;
        self
    }

    /// Compiles the query for the adapter.
    pub fn to_spec(&self) -> QuerySpec {
        QuerySpec {
            model: self.ty.name().to_string(),
            table: self.ty.table().to_string(),
            primary_column: self.ty.primary_column().to_string(),
            predicates: self.predicates.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            for_update: self.for_update,
            client: self.client.clone().filter(|client| !client.is_completed()),
        }
    }

    async fn rows(&self) -> CoreResult<Vec<Model>> {
        let spec = self.to_spec();
        trace!(model = %self.ty.name(), table = %spec.table, "selecting rows");
        let rows = self.orm.adapter().select(&spec).await?;
        rows.into_iter()
            .map(|row| {
                Model::from_row(
                    self.orm.clone(),
                    Arc::clone(&self.ty),
                    row,
                    spec.client.clone(),
                    self.sideload.clone(),
                )
            })
            .collect()
    }

    /// Returns the first matching instance.
    ///
    /// Fires `before:find` with the query and `after:find` with the
    /// instance.
    pub async fn first(mut self) -> CoreResult<Option<Model>> {
        self.limit = Some(1);
        let ty = Arc::clone(&self.ty);
        if self.hooks {
            run_query_hooks(&ty, HookEvent::BeforeFind, &mut self).await?;
        }
        let mut model = match self.rows().await?.into_iter().next() {
            Some(model) => model,
            None => return Ok(None),
        };
        if self.hooks {
            run_model_hooks(&ty, HookEvent::AfterFind, &mut model).await?;
        }
        Ok(Some(model))
    }

    /// Returns the first matching instance or fails with
    /// [`CoreError::RowNotFound`].
    pub async fn first_or_fail(self) -> CoreResult<Model> {
        let (key, value) = self.describe();
        let table = self.ty.table().to_string();
        self.first()
            .await?
            .ok_or_else(|| CoreError::row_not_found(table, key, value))
    }

    /// Returns all matching instances.
    ///
    /// Fires `before:fetch` with the query and `after:fetch` with the
    /// instances.
    pub async fn fetch(mut self) -> CoreResult<Vec<Model>> {
        let ty = Arc::clone(&self.ty);
        if self.hooks {
            run_query_hooks(&ty, HookEvent::BeforeFetch, &mut self).await?;
        }
        let mut models = self.rows().await?;
        if self.hooks {
            run_models_hooks(&ty, HookEvent::AfterFetch, &mut models).await?;
        }
        Ok(models)
    }

    /// Counts matching rows. No hooks fire.
    pub async fn count(&self) -> CoreResult<u64> {
        self.orm.adapter().count(&self.to_spec()).await
    }

    /// Returns one page of results.
    ///
    /// Only paginate hooks fire: `before:paginate` with the count and data
    /// queries, `after:paginate` with the page. `page` is 1-based; zero is
    /// treated as 1. `per_page` of zero uses the configured default. A page
    /// whose offset does not fit in a `u64` fails before any hook runs.
    pub async fn paginate(self, page: u64, per_page: u64) -> CoreResult<Page> {
        let page = page.max(1);
        let per_page = if per_page == 0 {
            self.orm.config().default_per_page.max(1)
        } else {
            per_page
        };
        let offset = (page - 1).checked_mul(per_page).ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "page {page} of {per_page} rows is out of range"
            ))
        })?;
        let ty = Arc::clone(&self.ty);

        let mut count = self.clone();
        count.order_by.clear();
        count.limit = None;
        count.offset = None;
        let mut data = self.limit(per_page).offset(offset);

        if data.hooks {
            run_paginate_hooks(&ty, &mut count, &mut data).await?;
        }
        let total = count.count().await?;
        let rows = data.rows().await?;

        let mut result = Page::new(rows, total, per_page, page, Arc::clone(ty.naming()));
        if data.hooks {
            run_page_hooks(&ty, &mut result).await?;
        }
        Ok(result)
    }

    fn describe(&self) -> (String, String) {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for predicate in &self.predicates {
            match predicate {
                Predicate::Compare { column, value, .. } => {
                    keys.push(column.clone());
                    values.push(value.key_string());
                }
                Predicate::In { column, values: candidates } => {
                    keys.push(column.clone());
                    values.push(
                        candidates
                            .iter()
                            .map(Value::key_string)
                            .collect::<Vec<_>>()
                            .join("|"),
                    );
                }
                Predicate::IsNull { column } => {
                    keys.push(column.clone());
                    values.push("null".to_string());
                }
                Predicate::NotNull { column } => {
                    keys.push(column.clone());
                    values.push("not null".to_string());
                }
                Predicate::Any(_) => {}
            }
        }
        if keys.is_empty() {
            return ("*".to_string(), "*".to_string());
        }
        (keys.join(","), values.join(","))
    }
}

impl fmt::Debug for ModelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("model", &self.ty.name())
            .field("predicates", &self.predicates)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("for_update", &self.for_update)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{models_hook, page_hook, paginate_hook, query_hook};
    use crate::model::test_support::orm;
    use crate::registry::{Column, ModelDefinition};
    use rowkit_value::values;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn attributes_map_to_columns() {
        let (orm, _) = orm();
        let spec = orm
            .model("User")
            .unwrap()
            .query()
            .where_eq("email", "a@b.c")
            .where_eq("points", Value::Null)
            .order_by("email", SortDirection::Asc)
            .to_spec();
        assert_eq!(
            spec.predicates,
            vec![
                Predicate::eq("email_address", "a@b.c"),
                Predicate::IsNull {
                    column: "points".into()
                },
            ]
        );
        assert_eq!(spec.order_by, vec![("email_address".into(), SortDirection::Asc)]);
    }

    #[tokio::test]
    async fn first_or_fail_reports_lookup() {
        let (orm, _) = orm();
        let err = orm
            .model("User")
            .unwrap()
            .query()
            .where_eq("username", "ghost")
            .first_or_fail()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "row not found: \"users\" where \"username\" = ghost"
        );
    }

    #[tokio::test]
    async fn sideloaded_values_reach_instances() {
        let (orm, adapter) = orm();
        adapter.seed("users", values! { "id" => 1 });
        let users = orm
            .model("User")
            .unwrap()
            .query()
            .sideload(values! { "tenant" => "acme" })
            .fetch()
            .await
            .unwrap();
        assert_eq!(users[0].sideloaded()["tenant"], Value::from("acme"));
    }

    #[tokio::test]
    async fn paginate_rejects_offsets_past_u64() {
        let (orm, adapter) = orm();
        let err = orm
            .model("User")
            .unwrap()
            .query()
            .paginate(u64::MAX, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        assert!(adapter.calls().is_empty());

        let page = orm
            .model("User")
            .unwrap()
            .query()
            .paginate(u64::MAX, 1)
            .await
            .unwrap();
        assert!(page.rows().is_empty());
    }

    fn define_scoped(orm: &Orm, seen: &Arc<AtomicUsize>) {
        let fetched = Arc::clone(seen);
        orm.define(
            ModelDefinition::new("Item")
                .table("items")
                .column(Column::primary_key("id"))
                .column(Column::new("archived"))
                .hook(
                    HookEvent::BeforeFind,
                    query_hook(|query| {
                        *query = query.clone().where_eq("archived", false);
                        Ok(())
                    }),
                )
                .hook(
                    HookEvent::BeforeFetch,
                    query_hook(|query| {
                        *query = query.clone().where_eq("archived", false);
                        Ok(())
                    }),
                )
                .hook(
                    HookEvent::AfterFetch,
                    models_hook(move |models| {
                        fetched.fetch_add(models.len(), Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .hook(
                    HookEvent::BeforePaginate,
                    paginate_hook(|count, data| {
                        *count = count.clone().where_eq("archived", false);
                        *data = data.clone().where_eq("archived", false);
                        Ok(())
                    }),
                )
                .hook(
                    HookEvent::AfterPaginate,
                    page_hook(|page| {
                        page.set_extra_meta("scoped", true);
                        Ok(())
                    }),
                ),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn read_hooks_scope_queries() {
        let (orm, adapter) = orm();
        let fetched = Arc::new(AtomicUsize::new(0));
        define_scoped(&orm, &fetched);
        for id in 1..=5 {
            adapter.seed("items", values! { "id" => id, "archived" => id == 3 });
        }
        let items = orm.model("Item").unwrap();

        assert!(items.find(3).await.unwrap().is_none());
        assert_eq!(items.all().await.unwrap().len(), 4);
        assert_eq!(fetched.load(Ordering::SeqCst), 4);

        let page = items.query().paginate(1, 3).await.unwrap();
        assert_eq!(page.total(), 4);
        assert_eq!(page.rows().len(), 3);
        assert_eq!(page.last_page(), 2);
        assert_eq!(page.meta()["scoped"], serde_json::json!(true));
        assert_eq!(fetched.load(Ordering::SeqCst), 4);
    }
}
