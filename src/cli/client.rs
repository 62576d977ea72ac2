use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::config::ServerInfo;

/// Thin JSON client for the provisioning API that unwraps the `{"success", "data"}` envelope
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(server: &ServerInfo) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: server.url.clone(),
            token: server.token.clone(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        self.send(request).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let request = self.http.post(format!("{}{}", self.base_url, path)).json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        mut request: reqwest::RequestBuilder,
    ) -> anyhow::Result<T> {
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        unwrap_envelope(status, body)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(status: StatusCode, body: Value) -> anyhow::Result<T> {
    if !status.is_success() {
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        let code = body.get("code").and_then(Value::as_str).unwrap_or("UNKNOWN");
        anyhow::bail!("{} ({}, HTTP {})", message, code, status.as_u16());
    }

    let data = body
        .get("data")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("response is missing the data envelope"))?;
    Ok(serde_json::from_value(data)?)
}
