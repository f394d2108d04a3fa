use crate::fetch::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};

/// An [`HttpClient`] wrapper that sets a fixed header on every request.
///
/// The statistics site rejects requests without a browser-like
/// `User-Agent`, so the scraper wraps its client with [`WithHeader::user_agent`].
pub struct WithHeader<C> {
    inner: C,
    name: HeaderName,
    value: HeaderValue,
}

impl<C> WithHeader<C> {
    pub fn new(inner: C, name: &str, value: &str) -> Result<Self> {
        Ok(Self {
            inner,
            name: HeaderName::from_bytes(name.as_bytes())?,
            value: HeaderValue::from_str(value)?,
        })
    }

    pub fn user_agent(inner: C, agent: &str) -> Result<Self> {
        Ok(Self {
            inner,
            name: USER_AGENT,
            value: HeaderValue::from_str(agent)?,
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for WithHeader<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut().insert(self.name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl HttpClient for Recorder {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let headers = req
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect::<Vec<_>>();
            self.seen.lock().unwrap().extend(headers);
            Ok(http::Response::new(Vec::<u8>::new()).into())
        }
    }

    #[tokio::test]
    async fn test_sets_header() {
        let client = WithHeader::user_agent(Recorder::default(), "Mozilla/5.0").unwrap();
        let req = reqwest::Request::new(reqwest::Method::GET, "http://example.test/".parse().unwrap());
        client.execute(req).await.unwrap();

        let seen = client.inner.seen.lock().unwrap();
        assert!(seen.contains(&("user-agent".to_string(), "Mozilla/5.0".to_string())));
    }

    #[test]
    fn test_rejects_invalid_header_name() {
        assert!(WithHeader::new(Recorder::default(), "bad header", "x").is_err());
    }
}
