#![cfg(feature = "http-directory")]

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::DirectoryConfig;
use crate::directory::{DirectoryError, KeyDirectory};

/// Key directory served by the chat server under `/api/publickey`.
#[derive(Clone)]
pub struct HttpKeyDirectory {
    base_url: Url,
    client: reqwest::Client,
    session_cookie: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest<'a> {
    username: &'a str,
    public_key: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchResponse {
    #[serde(default)]
    public_key: Option<String>,
}

impl HttpKeyDirectory {
    pub fn new(base_url: &str) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| DirectoryError::Rejected(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::Rejected(format!(
                "invalid base url: {base_url}"
            )));
        }
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(Self {
            base_url,
            client,
            session_cookie: None,
        })
    }

    pub fn from_config(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let mut directory = Self::new(&config.base_url)?;
        directory.session_cookie = config.session_cookie.clone();
        Ok(directory)
    }

    fn key_url(&self, username: Option<&str>) -> Result<Url, DirectoryError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DirectoryError::Rejected("invalid base url".to_string()))?;
            segments.pop_if_empty().extend(["api", "publickey"]);
            if let Some(username) = username {
                segments.push(username);
            }
        }
        Ok(url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => builder.header(reqwest::header::COOKIE, cookie),
            None => builder,
        }
    }
}

fn status_error(status: StatusCode, body: Option<String>) -> DirectoryError {
    let detail = format!("status={} body={:?}", status, body);
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DirectoryError::Rejected(detail)
        }
        _ => DirectoryError::Unavailable(detail),
    }
}

#[async_trait]
impl KeyDirectory for HttpKeyDirectory {
    async fn publish(&self, username: &str, public_key: &str) -> Result<(), DirectoryError> {
        let url = self.key_url(None)?;
        let resp = self
            .request(self.client.post(url))
            .json(&PublishRequest {
                username,
                public_key,
            })
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            Err(status_error(status, resp.text().await.ok()))
        }
    }

    async fn fetch(&self, username: &str) -> Result<String, DirectoryError> {
        let url = self.key_url(Some(username))?;
        let resp = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let body: FetchResponse = resp
                    .json()
                    .await
                    .map_err(|e| DirectoryError::Unavailable(format!("bad response: {e}")))?;
                // a registered user who never published has a null key
                match body.public_key {
                    Some(key) if !key.is_empty() => Ok(key),
                    _ => Err(DirectoryError::NotFound(username.to_string())),
                }
            }
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(username.to_string())),
            status => Err(status_error(status, resp.text().await.ok())),
        }
    }
}
