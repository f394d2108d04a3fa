use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes prepared requests; decorators add headers or credentials.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
