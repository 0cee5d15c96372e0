//! Lifecycle hooks.
//!
//! Hooks are registered per model type and event. They run in
//! registration order, ancestors first, and may abort the surrounding
//! operation by returning an error; the error reaches the caller
//! unchanged.

mod pipeline;

pub(crate) use pipeline::{
    run_model_hooks, run_models_hooks, run_page_hooks, run_paginate_hooks, run_query_hooks,
};

use crate::error::CoreResult;
use crate::model::Model;
use crate::query::{ModelQuery, Page};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookEvent {
    /// Before an unpersisted instance is inserted.
    BeforeCreate,
    /// After an insert.
    AfterCreate,
    /// Before a persisted instance is updated.
    BeforeUpdate,
    /// After an update.
    AfterUpdate,
    /// Before any save.
    BeforeSave,
    /// After any save.
    AfterSave,
    /// Before an instance is deleted.
    BeforeDelete,
    /// After an instance is deleted.
    AfterDelete,
    /// Before a single-row query runs.
    BeforeFind,
    /// After a single-row query returned an instance.
    AfterFind,
    /// Before a multi-row query runs.
    BeforeFetch,
    /// After a multi-row query returned its instances.
    AfterFetch,
    /// Before a paginated query runs.
    BeforePaginate,
    /// After a paginated query returned its page.
    AfterPaginate,
}

impl HookEvent {
    /// Returns the `phase:event` form of the event, for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            HookEvent::BeforeCreate => "before:create",
            HookEvent::AfterCreate => "after:create",
            HookEvent::BeforeUpdate => "before:update",
            HookEvent::AfterUpdate => "after:update",
            HookEvent::BeforeSave => "before:save",
            HookEvent::AfterSave => "after:save",
            HookEvent::BeforeDelete => "before:delete",
            HookEvent::AfterDelete => "after:delete",
            HookEvent::BeforeFind => "before:find",
            HookEvent::AfterFind => "after:find",
            HookEvent::BeforeFetch => "before:fetch",
            HookEvent::AfterFetch => "after:fetch",
            HookEvent::BeforePaginate => "before:paginate",
            HookEvent::AfterPaginate => "after:paginate",
        }
    }

    /// Whether the event fires before the operation.
    pub const fn is_before(self) -> bool {
        matches!(
            self,
            HookEvent::BeforeCreate
                | HookEvent::BeforeUpdate
                | HookEvent::BeforeSave
                | HookEvent::BeforeDelete
                | HookEvent::BeforeFind
                | HookEvent::BeforeFetch
                | HookEvent::BeforePaginate
        )
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook receives.
///
/// Persistence events carry the instance, `before:find`/`before:fetch`
/// carry the query, `after:fetch` carries the fetched instances,
/// `before:paginate` carries the count and data queries, and
/// `after:paginate` carries the page.
pub enum HookPayload<'a> {
    /// A single instance.
    Model(&'a mut Model),
    /// The instances returned by a fetch.
    Models(&'a mut Vec<Model>),
    /// A query about to run.
    Query(&'a mut ModelQuery),
    /// The count and data queries of a paginated read.
    Paginate {
        /// Query used for the total count.
        count: &'a mut ModelQuery,
        /// Query used for the rows.
        data: &'a mut ModelQuery,
    },
    /// A page of results.
    Page(&'a mut Page),
}

/// A lifecycle hook.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Runs the hook. Returning an error aborts the operation.
    async fn run(&self, payload: HookPayload<'_>) -> CoreResult<()>;
}

struct FnHook<F>(F);

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: for<'a> Fn(HookPayload<'a>) -> CoreResult<()> + Send + Sync,
{
    async fn run(&self, payload: HookPayload<'_>) -> CoreResult<()> {
        (self.0)(payload)
    }
}

fn fn_hook<F>(f: F) -> Arc<dyn Hook>
where
    F: for<'a> Fn(HookPayload<'a>) -> CoreResult<()> + Send + Sync + 'static,
{
    Arc::new(FnHook(f))
}

/// Wraps a synchronous closure over a single instance. Other payloads are
/// ignored.
pub fn model_hook<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut Model) -> CoreResult<()> + Send + Sync + 'static,
{
    fn_hook(move |payload| match payload {
        HookPayload::Model(model) => f(model),
        _ => Ok(()),
    })
}

/// Wraps a synchronous closure over a query. Other payloads are ignored.
pub fn query_hook<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut ModelQuery) -> CoreResult<()> + Send + Sync + 'static,
{
    fn_hook(move |payload| match payload {
        HookPayload::Query(query) => f(query),
        _ => Ok(()),
    })
}

/// Wraps a synchronous closure over fetched instances. Other payloads are
/// ignored.
pub fn models_hook<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut Vec<Model>) -> CoreResult<()> + Send + Sync + 'static,
{
    fn_hook(move |payload| match payload {
        HookPayload::Models(models) => f(models),
        _ => Ok(()),
    })
}

/// Wraps a synchronous closure over the count and data queries of a
/// paginated read. Other payloads are ignored.
pub fn paginate_hook<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut ModelQuery, &mut ModelQuery) -> CoreResult<()> + Send + Sync + 'static,
{
    fn_hook(move |payload| match payload {
        HookPayload::Paginate { count, data } => f(count, data),
        _ => Ok(()),
    })
}

/// Wraps a synchronous closure over a page. Other payloads are ignored.
pub fn page_hook<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut Page) -> CoreResult<()> + Send + Sync + 'static,
{
    fn_hook(move |payload| match payload {
        HookPayload::Page(page) => f(page),
        _ => Ok(()),
    })
}

/// Hooks of a model type, grouped by event.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<HookEvent, Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    /// Adds a hook. A handle already registered for the event is skipped.
    pub fn register(&mut self, event: HookEvent, hook: Arc<dyn Hook>) {
        let hooks = self.hooks.entry(event).or_default();
        if !hooks.iter().any(|existing| same_hook(existing, &hook)) {
            hooks.push(hook);
        }
    }

    /// Hooks for `event`, in run order.
    pub fn get(&self, event: HookEvent) -> &[Arc<dyn Hook>] {
        self.hooks.get(&event).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any hook is registered for `event`.
    pub fn has(&self, event: HookEvent) -> bool {
        !self.get(event).is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.hooks.iter().map(|(event, hooks)| (event.as_str(), hooks.len())))
            .finish()
    }
}

fn same_hook(a: &Arc<dyn Hook>, b: &Arc<dyn Hook>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}
