use crate::{backend::utils::error::BackendResult, common::moderation::GameSubmission};
use anyhow::anyhow;
use log::warn;
use reqwest::{Client, RequestBuilder};
use url::Url;

/// Maximum number of submissions the backend returns per request.
pub const MAX_SUBMISSIONS: u32 = 50;

/// Client for the REST backend which stores game submissions. Every request is made with the
/// token of the moderator, so the backend performs its own permission checks.
#[derive(Clone)]
pub struct SubmissionsClient {
    api_base: String,
    client: Client,
}

impl SubmissionsClient {
    pub fn new(api_base: String, client: Client) -> Self {
        SubmissionsClient {
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn list_url(&self, status: &str, limit: u32) -> BackendResult<Url> {
        let mut url = self.endpoint(&["submissions"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.min(MAX_SUBMISSIONS).to_string())
            .append_pair("status", status);
        Ok(url)
    }

    /// Url of a single submission, with `action` appended when given. The id is encoded as one
    /// path segment.
    fn item_url(&self, id: &str, action: Option<&str>) -> BackendResult<Url> {
        let mut segments = vec!["submissions", id];
        segments.extend(action);
        self.endpoint(&segments)
    }

    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = Url::parse(&self.api_base)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid submissions api base {}", self.api_base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn list(
        &self,
        token: &str,
        status: &str,
        limit: u32,
    ) -> BackendResult<Vec<GameSubmission>> {
        let req = self.client.get(self.list_url(status, limit)?);
        let res = send(req, token).await?;
        Ok(res.json().await?)
    }

    pub async fn publish(&self, token: &str, id: &str) -> BackendResult<()> {
        let req = self.client.post(self.item_url(id, Some("publish"))?);
        send(req, token).await?;
        Ok(())
    }

    pub async fn unpublish(&self, token: &str, id: &str) -> BackendResult<()> {
        let req = self.client.post(self.item_url(id, Some("unpublish"))?);
        send(req, token).await?;
        Ok(())
    }

    pub async fn delete(&self, token: &str, id: &str) -> BackendResult<()> {
        let req = self.client.delete(self.item_url(id, None)?);
        send(req, token).await?;
        Ok(())
    }
}

async fn send(req: RequestBuilder, token: &str) -> BackendResult<reqwest::Response> {
    let res = req.bearer_auth(token).send().await?;
    let status = res.status();
    if !status.is_success() {
        let url = res.url().to_string();
        warn!("Submissions backend returned {status} for {url}");
        return Err(anyhow!("Submissions backend returned {status}").into());
    }
    Ok(res)
}
