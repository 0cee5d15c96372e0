//! Paginated results.

use crate::error::CoreResult;
use crate::model::{CherryPick, Model};
use crate::naming::NamingStrategy;
use serde_json::{json, Map, Value as Json};
use std::fmt;
use std::sync::Arc;

/// One page of hydrated instances plus counters.
pub struct Page {
    rows: Vec<Model>,
    total: u64,
    per_page: u64,
    current_page: u64,
    naming: Arc<dyn NamingStrategy>,
    extra_meta: Map<String, Json>,
}

impl Page {
    pub(crate) fn new(
        rows: Vec<Model>,
        total: u64,
        per_page: u64,
        current_page: u64,
        naming: Arc<dyn NamingStrategy>,
    ) -> Self {
        Self {
            rows,
            total,
            per_page: per_page.max(1),
            current_page: current_page.max(1),
            naming,
            extra_meta: Map::new(),
        }
    }

    /// Instances on this page.
    pub fn rows(&self) -> &[Model] {
        &self.rows
    }

    /// Mutable access for `after:paginate` hooks.
    pub fn rows_mut(&mut self) -> &mut Vec<Model> {
        &mut self.rows
    }

    /// Consumes the page.
    pub fn into_rows(self) -> Vec<Model> {
        self.rows
    }

    /// Matching rows across all pages.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Page size.
    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// 1-based page number.
    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Always 1.
    pub fn first_page(&self) -> u64 {
        1
    }

    /// Last page number; 1 when there are no rows.
    pub fn last_page(&self) -> u64 {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// Whether pages follow this one.
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    /// Whether the page holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds an entry to the rendered meta block.
    pub fn set_extra_meta(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        self.extra_meta.insert(key.into(), value.into());
    }

    /// Counters keyed by the naming strategy's meta keys.
    pub fn meta(&self) -> Json {
        let keys = self.naming.pagination_meta_keys();
        let mut meta = Map::new();
        meta.insert(keys.total, json!(self.total));
        meta.insert(keys.per_page, json!(self.per_page));
        meta.insert(keys.current_page, json!(self.current_page));
        meta.insert(keys.last_page, json!(self.last_page()));
        meta.insert(keys.first_page, json!(self.first_page()));
        meta.extend(self.extra_meta.clone());
        Json::Object(meta)
    }

    /// `{ "meta": ..., "data": [...] }` with every row serialized.
    pub fn serialize(&self, pick: Option<&CherryPick>) -> CoreResult<Json> {
        let data = self
            .rows
            .iter()
            .map(|row| row.serialize(pick))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(json!({ "meta": self.meta(), "data": data }))
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("rows", &self.rows.len())
            .field("total", &self.total)
            .field("per_page", &self.per_page)
            .field("current_page", &self.current_page)
            .finish_non_exhaustive()
    }
}
