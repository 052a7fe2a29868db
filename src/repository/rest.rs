//! Hosted Backend Store
//!
//! Talks to the hosted backend's PostgREST endpoint (`/rest/v1/<table>`) and
//! its auth endpoint (`/auth/v1/user`).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::access::role_from_store;
use super::error::{StoreError, StoreResult};
use super::traits::{AccessControl, Filter, Order, RemoteStore, Row};
use crate::domain::{Identity, Role};

/// REST implementation of [`RemoteStore`]
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> StoreResult<HeaderMap> {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.api_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);
        Ok(headers)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> StoreResult<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.table_url(table))
            .headers(self.auth_headers()?))
    }

    /// The user behind the access token, if the session is valid
    pub async fn session_user(&self) -> StoreResult<Option<Identity>> {
        if self.access_token.is_none() {
            return Ok(None);
        }
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .headers(self.auth_headers()?)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        #[derive(Deserialize)]
        struct AuthUser {
            id: String,
        }
        let user: AuthUser = check(response).await?.json().await?;
        Ok(Some(Identity::new(user.id)))
    }
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| StoreError::Other(format!("invalid header value: {}", e)))
}

/// PostgREST filter parameters: `column=eq.value`
fn filter_params(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|(column, value)| {
            let operand = match value {
                Value::Null => "is.null".to_string(),
                Value::String(s) => format!("eq.{}", s),
                other => format!("eq.{}", other),
            };
            (column.clone(), operand)
        })
        .collect()
}

/// Turn a non-success status into `StoreError::Rejected`
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, table: &str, filter: &Filter, order: Option<&Order>) -> StoreResult<Vec<Row>> {
        let mut query = filter_params(filter);
        query.push(("select".to_string(), "*".to_string()));
        if let Some(order) = order {
            let direction = if order.ascending { "asc" } else { "desc" };
            query.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }

        let response = self.request(reqwest::Method::GET, table)?.query(&query).send().await?;
        Ok(check(response).await?.json::<Vec<Row>>().await?)
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        let response = self
            .request(reqwest::Method::POST, table)?
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let rows = check(response).await?.json::<Vec<Row>>().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> StoreResult<()> {
        let response = self
            .request(reqwest::Method::PATCH, table)?
            .query(&filter_params(filter))
            .json(&patch)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<()> {
        if filter.is_empty() {
            return Err(StoreError::Other("refusing to delete without a filter".to_string()));
        }
        let response = self
            .request(reqwest::Method::DELETE, table)?
            .query(&filter_params(filter))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let deleted = check(response).await?.json::<Vec<Row>>().await?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound { table: table.to_string() });
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .request(reqwest::Method::POST, table)?
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&rows)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Access control backed by the hosted auth session and `user_roles`
pub struct SessionAccess {
    store: Arc<RestStore>,
}

impl SessionAccess {
    pub fn new(store: Arc<RestStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccessControl for SessionAccess {
    async fn current_identity(&self) -> StoreResult<Option<Identity>> {
        self.store.session_user().await
    }

    async fn role_of(&self, identity: &Identity) -> StoreResult<Option<Role>> {
        role_from_store(self.store.as_ref(), identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_params() {
        let filter = Filter::new().eq("profile_id", "p1").eq("sort_order", 2).eq("user_id", Value::Null);
        let params = filter_params(&filter);
        assert_eq!(
            params,
            vec![
                ("profile_id".to_string(), "eq.p1".to_string()),
                ("sort_order".to_string(), "eq.2".to_string()),
                ("user_id".to_string(), "is.null".to_string()),
            ]
        );
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let store = RestStore::new("https://db.example.co/", "anon", None, Duration::from_secs(1)).unwrap();
        assert_eq!(store.table_url("profile_buttons"), "https://db.example.co/rest/v1/profile_buttons");
    }
}
