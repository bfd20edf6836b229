//! Odoo JSON-RPC client.
//!
//! Talks to the `/jsonrpc` endpoint: one `common.login` call at connect
//! time, then `object.execute_kw` for every model call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::{json, Value as Json};
use tracing::{debug, info};

use super::Destination;
use crate::config::DestinationConfig;
use crate::error::{MigrateError, Result};

/// An authenticated Odoo session.
pub struct OdooClient {
    endpoint: String,
    database: String,
    secret: String,
    uid: i64,
    client: ReqwestClient,
    next_id: AtomicU64,
}

impl OdooClient {
    /// Authenticate against the destination.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Authentication`] when the credentials are
    /// refused and [`MigrateError::Rpc`] when the server cannot be reached.
    pub async fn connect(config: &DestinationConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let mut this = Self {
            endpoint: config.endpoint(),
            database: config.database.clone(),
            secret: config.secret.clone(),
            uid: 0,
            client,
            next_id: AtomicU64::new(1),
        };

        let result = this
            .call(
                "common",
                "login",
                json!([config.database, config.user, config.secret]),
            )
            .await?;

        this.uid = match result.as_i64() {
            Some(uid) => uid,
            None => {
                return Err(MigrateError::Authentication {
                    database: config.database.clone(),
                    user: config.user.clone(),
                })
            }
        };

        info!(
            "Authenticated to Odoo {} as {} (uid {})",
            config.url, config.user, this.uid
        );
        Ok(this)
    }

    async fn call(&self, service: &str, method: &str, args: Json) -> Result<Json> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": service,
                "method": method,
                "args": args,
            },
            "id": id,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let reply: Json = response.json().await?;
        parse_response(service, reply)
    }
}

#[async_trait]
impl Destination for OdooClient {
    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Json>,
        kwargs: Option<Json>,
    ) -> Result<Json> {
        debug!("execute_kw {}.{} ({} args)", model, method, args.len());
        let mut call_args = vec![
            json!(self.database),
            json!(self.uid),
            json!(self.secret),
            json!(model),
            json!(method),
            Json::Array(args),
        ];
        if let Some(kwargs) = kwargs {
            call_args.push(kwargs);
        }
        self.call("object", "execute_kw", Json::Array(call_args))
            .await
            .map_err(|e| match e {
                MigrateError::Destination { message, .. } => MigrateError::destination(
                    format!("{}.{}", model, method),
                    message,
                ),
                other => other,
            })
    }
}

/// Unwrap a JSON-RPC reply into its result, or the remote fault.
fn parse_response(context: &str, mut reply: Json) -> Result<Json> {
    if let Some(error) = reply.get("error") {
        let message = error
            .pointer("/data/message")
            .or_else(|| error.get("message"))
            .and_then(Json::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(MigrateError::destination(context, message));
    }
    match reply.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(MigrateError::destination(
            context,
            "reply carries neither result nor error",
        )),
    }
}
