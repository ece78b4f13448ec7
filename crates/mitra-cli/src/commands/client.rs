// Thin HTTP client for the node API.

use reqwest::{Client, RequestBuilder};
use serde_json::Value;

pub struct ApiClient {
    base: String,
    token: Option<String>,
    http: Client,
}

impl ApiClient {
    pub fn new(base: &str, token: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
            http,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn get(&self, path: &str) -> Result<Value, Box<dyn std::error::Error>> {
        self.send(self.http.get(self.url(path))).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, Box<dyn std::error::Error>> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, Box<dyn std::error::Error>> {
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let resp = req.send().await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        if !status.is_success() || body["status"] == "error" {
            return Err(describe_error(status.as_u16(), &body).into());
        }
        Ok(body)
    }
}

/// Human-readable line for an error body.
pub fn describe_error(status: u16, body: &Value) -> String {
    let kind = body["error"].as_str().unwrap_or("error");
    let msg = body["msg"].as_str().unwrap_or("request failed");
    let mut line = format!("{} ({}): {}", kind, status, msg);
    if body["retryable"].as_bool() == Some(true) {
        line.push_str(" [retryable]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new("http://localhost:3000/", None).unwrap();
        assert_eq!(client.url("/api/account"), "http://localhost:3000/api/account");
    }

    #[test]
    fn test_describe_error() {
        let body = json!({
            "status": "error",
            "code": 402,
            "error": "insufficient_funds",
            "msg": "balance 3 is less than 10",
        });
        assert_eq!(
            describe_error(402, &body),
            "insufficient_funds (402): balance 3 is less than 10"
        );

        let body = json!({ "status": "error", "error": "contention", "msg": "gave up", "retryable": true });
        assert!(describe_error(409, &body).ends_with("[retryable]"));
    }
}
