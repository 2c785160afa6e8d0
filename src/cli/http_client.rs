use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const DEFAULT_URL: &str = "http://localhost:8000";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Percent-encodes one path segment. Endpoint URLs are addressed this way.
#[must_use]
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, verbose: bool) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            verbose,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        if self.verbose {
            tracing::debug!("{} {}", method, url);
        }
        self.client
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self.request(Method::GET, path).send()?;
        self.handle_response(resp)
    }

    pub fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> anyhow::Result<T> {
        let resp = self.request(Method::GET, path).query(query).send()?;
        self.handle_response(resp)
    }

    pub fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let resp = self.request(Method::POST, path).json(body).send()?;
        self.handle_response(resp)
    }

    pub fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let resp = self.request(Method::PUT, path).json(body).send()?;
        self.handle_response(resp)
    }

    pub fn delete(&self, path: &str) -> anyhow::Result<()> {
        let resp = self.request(Method::DELETE, path).send()?;
        self.check_status(resp).map(|_| ())
    }

    fn check_status(&self, resp: Response) -> anyhow::Result<Response> {
        let status = resp.status();
        if self.verbose {
            tracing::debug!("{} {}", status.as_u16(), resp.url());
        }
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    format!("Server returned {status}")
                } else {
                    text.trim().to_string()
                }
            });
        Err(anyhow::anyhow!(message))
    }

    fn handle_response<T: DeserializeOwned>(&self, resp: Response) -> anyhow::Result<T> {
        let resp = self.check_status(resp)?;
        let text = resp.text()?;
        if self.verbose {
            tracing::debug!("response body: {}", text);
        }
        serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Server returned an unexpected response: {e}"))
    }
}
