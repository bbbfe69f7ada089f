use serde::Deserialize;
use tracing::error;

use super::{DEFAULT_LIST_LIMIT, ListKey, ListOptions, ListResult, Store};

const API_BASE: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error(
        "failed to manipulate kv store. status: {code}, errors: {errors:?}, messages: {messages:?}"
    )]
    Fail {
        code: reqwest::StatusCode,
        errors: Vec<ResponseInfo>,
        messages: Vec<ResponseInfo>,
    },
    #[error("unexpected response from kv store. status: {code}, body: {body}")]
    Unexpected {
        code: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseInfoPointer {
    pub pointer: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseInfo {
    pub code: u16,
    pub message: String,
    pub documentation_url: Option<url::Url>,
    pub source: Option<ResponseInfoPointer>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultInfo {
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Response<R> {
    #[serde(default)]
    pub errors: Vec<ResponseInfo>,
    #[serde(default)]
    pub messages: Vec<ResponseInfo>,
    pub success: bool,
    pub result: Option<R>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

/// One Workers KV namespace, addressed through the Cloudflare REST API.
#[derive(derive_debug::Dbg)]
pub struct KvStore {
    account_id: String,
    namespace: String,
    #[dbg(skip)]
    token: String,
    client: reqwest::Client,
}

impl KvStore {
    pub fn new(
        account_id: impl Into<String>,
        namespace: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            namespace: namespace.into(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn namespace_endpoint(&self) -> String {
        format!(
            "{API_BASE}/accounts/{}/storage/kv/namespaces/{}",
            self.account_id, self.namespace
        )
    }

    fn value_endpoint(&self, key: &str) -> String {
        format!(
            "{}/values/{}",
            self.namespace_endpoint(),
            urlencoding::encode(key)
        )
    }

    async fn check<R: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Response<R>, Error> {
        let code = response.status();
        let body = response.text().await.map_err(Error::Transport)?;
        let response = serde_json::from_str::<Response<R>>(&body).map_err(|error| {
            error!(%error, %code, "failed to decode kv response");
            Error::Unexpected {
                code,
                body: body.clone(),
            }
        })?;
        if !response.errors.is_empty() || !response.success {
            return Err(Error::Fail {
                code,
                errors: response.errors,
                messages: response.messages,
            });
        }
        Ok(response)
    }
}

impl Store for KvStore {
    type Error = Error;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let response = self
            .client
            .get(self.value_endpoint(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Error::Transport)?;
        let code = response.status();
        if code == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await.map_err(Error::Transport)?;
        if !code.is_success() {
            return Err(Error::Unexpected { code, body });
        }
        Ok(Some(body))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let response = self
            .client
            .put(self.value_endpoint(key))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(value.to_owned())
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::check::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        let response = self
            .client
            .delete(self.value_endpoint(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::check::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> Result<ListResult, Self::Error> {
        let limit = options.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(10, 1000);
        let mut query = vec![("limit", limit.to_string())];
        if let Some(prefix) = options.prefix {
            query.push(("prefix", prefix));
        }
        if let Some(cursor) = options.cursor {
            query.push(("cursor", cursor));
        }
        let response = self
            .client
            .get(format!("{}/keys", self.namespace_endpoint()))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .map_err(Error::Transport)?;
        let response = Self::check::<Vec<ListKey>>(response).await?;
        let cursor = response
            .result_info
            .and_then(|info| info.cursor)
            .filter(|cursor| !cursor.is_empty());
        Ok(ListResult {
            keys: response.result.unwrap_or_default(),
            list_complete: cursor.is_none(),
            cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_list_response() {
        let body = r#"{
            "errors": [],
            "messages": [],
            "success": true,
            "result": [{"name": "docs/about", "expiration": 1577836800}],
            "result_info": {"count": 1, "cursor": "6Ck1la0VxJ0djhidm1MdX2FyDGxLKVeeHZZmORS_8XeSuhz9SjIJRaSa2lnsF01tQOHrfTGAP3R5X1Kv5iVUuMbNKhWNAXHOl6ePB0TUL8nw"}
        }"#;
        let response: Response<Vec<ListKey>> = serde_json::from_str(body).unwrap();
        assert_eq!(response.result.unwrap()[0].name, "docs/about");
        assert!(response.result_info.unwrap().cursor.is_some());
    }

    #[test]
    fn test_keys_are_url_encoded() {
        let store = KvStore::new("account", "ns", "token");
        assert_eq!(
            store.value_endpoint("docs/about.md"),
            "https://api.cloudflare.com/client/v4/accounts/account/storage/kv/namespaces/ns/values/docs%2Fabout.md"
        );
    }
}
