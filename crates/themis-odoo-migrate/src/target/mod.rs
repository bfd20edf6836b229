//! Odoo destination access.
//!
//! Every destination interaction is an `execute_kw` call on a model.
//! [`Destination`] is that single seam; `create`, `write` and `search_read`
//! are layered on top of it so test doubles only implement one method.

mod odoo;

pub use odoo::OdooClient;

use crate::core::Record;
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use serde_json::{json, Value as Json};

/// Trait for destination operations.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Call `method` on `model` with positional `args` and optional keyword
    /// arguments. Returns the raw result.
    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Json>,
        kwargs: Option<Json>,
    ) -> Result<Json>;

    /// Create records through `method` (`create` or a bulk import method)
    /// and return the new ids, in input order.
    async fn create_with(&self, model: &str, method: &str, records: Vec<Record>) -> Result<Vec<i64>> {
        let records = records.into_iter().map(Json::Object).collect();
        let result = self
            .execute_kw(model, method, vec![Json::Array(records)], None)
            .await?;
        parse_ids(model, &result)
    }

    async fn create(&self, model: &str, records: Vec<Record>) -> Result<Vec<i64>> {
        self.create_with(model, "create", records).await
    }

    /// Apply the same patch to every id.
    async fn write(&self, model: &str, ids: &[i64], patch: Record) -> Result<()> {
        self.execute_kw(
            model,
            "write",
            vec![json!(ids), Json::Object(patch)],
            None,
        )
        .await?;
        Ok(())
    }

    async fn search_read(&self, model: &str, domain: Json, fields: &[&str]) -> Result<Vec<Record>> {
        let result = self
            .execute_kw(model, "search_read", vec![domain], Some(json!({ "fields": fields })))
            .await?;
        match result {
            Json::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Json::Object(record) => Ok(record),
                    other => Err(MigrateError::destination(
                        model,
                        format!("search_read returned a non-record: {}", other),
                    )),
                })
                .collect(),
            other => Err(MigrateError::destination(
                model,
                format!("search_read returned {}", other),
            )),
        }
    }
}

/// Read a list of record ids out of a call result.
pub fn parse_ids(model: &str, result: &Json) -> Result<Vec<i64>> {
    let items = match result {
        Json::Array(items) => items.as_slice(),
        // Single-record create returns a bare id
        Json::Number(_) => std::slice::from_ref(result),
        other => {
            return Err(MigrateError::destination(
                model,
                format!("expected a list of ids, got {}", other),
            ))
        }
    };
    items
        .iter()
        .map(|v| {
            v.as_i64().ok_or_else(|| {
                MigrateError::destination(model, format!("expected an id, got {}", v))
            })
        })
        .collect()
}
