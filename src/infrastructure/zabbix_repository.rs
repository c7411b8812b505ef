// Zabbix JSON-RPC repository: host enumeration by host group
use crate::application::dashboard_repository::HostDirectory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Debug, Error)]
pub enum ZabbixError {
    #[error("Zabbix API error {code}: {message} {data}")]
    Rpc {
        code: i64,
        message: String,
        data: String,
    },

    #[error("Zabbix host group '{0}' not found")]
    UnknownGroup(String),
}

#[derive(Debug)]
pub struct ZabbixRepository {
    endpoint: String,
    username: String,
    password: String,
    /// Servers before 6.4 want `user` at login and the session in the body.
    legacy_auth: bool,
    client: reqwest::Client,
    session: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct HostGroup {
    groupid: String,
}

#[derive(Debug, Deserialize)]
struct Host {
    host: String,
}

impl ZabbixRepository {
    pub fn new(url: String, username: String, password: String) -> Self {
        let url = url.trim_end_matches('/');
        let endpoint = if url.ends_with("api_jsonrpc.php") {
            url.to_string()
        } else {
            format!("{}/api_jsonrpc.php", url)
        };

        Self {
            endpoint,
            username,
            password,
            legacy_auth: false,
            client: reqwest::Client::new(),
            session: OnceCell::new(),
        }
    }

    pub fn with_legacy_auth(mut self, legacy_auth: bool) -> Self {
        self.legacy_auth = legacy_auth;
        self
    }

    fn login_params(&self) -> Value {
        if self.legacy_auth {
            json!({ "user": self.username, "password": self.password })
        } else {
            json!({ "username": self.username, "password": self.password })
        }
    }

    fn request_body(&self, method: &str, params: Value, auth: Option<&str>) -> Value {
        let mut body = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
        if let (true, Some(token), Value::Object(fields)) = (self.legacy_auth, auth, &mut body) {
            fields.insert("auth".to_string(), json!(token));
        }
        body
    }

    async fn session(&self) -> Result<&String> {
        self.session
            .get_or_try_init(|| async move {
                let token: String = self.call("user.login", self.login_params(), None).await?;
                tracing::debug!("Logged in to Zabbix as {}", self.username);
                Ok::<String, anyhow::Error>(token)
            })
            .await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value, auth: Option<&str>) -> Result<T> {
        let body = self.request_body(method, params, auth);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let (false, Some(token)) = (self.legacy_auth, auth) {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to Zabbix", method))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Zabbix {} failed with status {}: {}", method, status, body);
        }

        let data = response
            .json::<RpcResponse>()
            .await
            .with_context(|| format!("Failed to parse Zabbix {} response", method))?;

        decode_response(data).with_context(|| format!("Zabbix {} failed", method))
    }
}

fn decode_response<T: DeserializeOwned>(response: RpcResponse) -> Result<T> {
    if let Some(error) = response.error {
        return Err(ZabbixError::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }
        .into());
    }

    let result = response.result.context("Response has neither result nor error")?;
    Ok(serde_json::from_value(result)?)
}

#[async_trait]
impl HostDirectory for ZabbixRepository {
    async fn hosts_in_group(&self, group: &str) -> Result<Vec<String>> {
        let token = self.session().await?.clone();

        let groups: Vec<HostGroup> = self
            .call(
                "hostgroup.get",
                json!({ "output": ["groupid"], "filter": { "name": [group] } }),
                Some(&token),
            )
            .await?;
        let group_id = groups
            .into_iter()
            .next()
            .map(|g| g.groupid)
            .ok_or_else(|| ZabbixError::UnknownGroup(group.to_string()))?;

        let hosts: Vec<Host> = self
            .call(
                "host.get",
                json!({ "output": ["host"], "groupids": [group_id] }),
                Some(&token),
            )
            .await?;

        let mut names: Vec<String> = hosts.into_iter().map(|h| h.host).collect();
        names.sort();
        tracing::debug!("Found {} host(s) in group {}", names.len(), group);
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> RpcResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_endpoint() {
        let repository = ZabbixRepository::new("http://zabbix.local/zabbix/".to_string(), "u".into(), "p".into());
        assert_eq!(repository.endpoint, "http://zabbix.local/zabbix/api_jsonrpc.php");

        let repository =
            ZabbixRepository::new("http://zabbix.local/api_jsonrpc.php".to_string(), "u".into(), "p".into());
        assert_eq!(repository.endpoint, "http://zabbix.local/api_jsonrpc.php");
    }

    #[test]
    fn test_session_travels_in_header_by_default() {
        let repository = ZabbixRepository::new("http://zabbix.local".to_string(), "Admin".into(), "pw".into());
        assert_eq!(repository.login_params(), json!({ "username": "Admin", "password": "pw" }));

        let body = repository.request_body("host.get", json!({}), Some("s3ss10n"));
        assert!(body.get("auth").is_none());
        assert_eq!(body["method"], "host.get");
    }

    #[test]
    fn test_legacy_auth_uses_body() {
        let repository = ZabbixRepository::new("http://zabbix.local".to_string(), "Admin".into(), "pw".into())
            .with_legacy_auth(true);
        assert_eq!(repository.login_params(), json!({ "user": "Admin", "password": "pw" }));

        let body = repository.request_body("hostgroup.get", json!({ "output": ["groupid"] }), Some("s3ss10n"));
        assert_eq!(body["auth"], "s3ss10n");
        assert_eq!(body["jsonrpc"], "2.0");

        let login = repository.request_body("user.login", repository.login_params(), None);
        assert!(login.get("auth").is_none());
    }

    #[test]
    fn test_decode_result() {
        let hosts: Vec<Host> = decode_response(parse(json!({
            "jsonrpc": "2.0",
            "result": [{ "hostid": "10084", "host": "zubat" }, { "hostid": "10085", "host": "abra" }],
            "id": 1
        })))
        .unwrap();
        let names: Vec<&str> = hosts.iter().map(|h| h.host.as_str()).collect();
        assert_eq!(names, vec!["zubat", "abra"]);
    }

    #[test]
    fn test_decode_error() {
        let err = decode_response::<Vec<Host>>(parse(json!({
            "jsonrpc": "2.0",
            "error": { "code": -32602, "message": "Invalid params.", "data": "Not authorized." },
            "id": 1
        })))
        .unwrap_err();

        match err.downcast_ref::<ZabbixError>() {
            Some(ZabbixError::Rpc { code, data, .. }) => {
                assert_eq!(*code, -32602);
                assert_eq!(data, "Not authorized.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
