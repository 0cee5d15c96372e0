//! Sequential hook execution.

use super::{Hook, HookEvent, HookPayload};
use crate::error::CoreResult;
use crate::model::Model;
use crate::query::{ModelQuery, Page};
use crate::registry::ModelType;
use std::sync::Arc;
use tracing::trace;

fn hooks_for(ty: &ModelType, event: HookEvent) -> Vec<Arc<dyn Hook>> {
    let hooks = ty.hooks().get(event).to_vec();
    if !hooks.is_empty() {
        trace!(model = %ty.name(), event = %event, count = hooks.len(), "running hooks");
    }
    hooks
}

pub(crate) async fn run_model_hooks(
    ty: &ModelType,
    event: HookEvent,
    model: &mut Model,
) -> CoreResult<()> {
    for hook in hooks_for(ty, event) {
        hook.run(HookPayload::Model(&mut *model)).await?;
    }
    Ok(())
}

pub(crate) async fn run_models_hooks(
    ty: &ModelType,
    event: HookEvent,
    models: &mut Vec<Model>,
) -> CoreResult<()> {
    for hook in hooks_for(ty, event) {
        hook.run(HookPayload::Models(&mut *models)).await?;
    }
    Ok(())
}

pub(crate) async fn run_query_hooks(
    ty: &ModelType,
    event: HookEvent,
    query: &mut ModelQuery,
) -> CoreResult<()> {
    for hook in hooks_for(ty, event) {
        hook.run(HookPayload::Query(&mut *query)).await?;
    }
    Ok(())
}

pub(crate) async fn run_paginate_hooks(
    ty: &ModelType,
    count: &mut ModelQuery,
    data: &mut ModelQuery,
) -> CoreResult<()> {
    for hook in hooks_for(ty, HookEvent::BeforePaginate) {
        hook.run(HookPayload::Paginate {
            count: &mut *count,
            data: &mut *data,
        })
        .await?;
    }
    Ok(())
}

pub(crate) async fn run_page_hooks(ty: &ModelType, page: &mut Page) -> CoreResult<()> {
    for hook in hooks_for(ty, HookEvent::AfterPaginate) {
        hook.run(HookPayload::Page(&mut *page)).await?;
    }
    Ok(())
}
