use crate::backend::utils::{
    config::GlitchConfigStorage,
    error::{BackendError, BackendResult},
};
use anyhow::anyhow;
use async_trait::async_trait;
use log::error;
use reqwest::{header::CONTENT_TYPE, Client};

/// Storage for uploaded files which are served publicly, eg article covers.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the file and returns its public url. Existing files are never overwritten.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String>;
}

/// Storage API as provided by Supabase.
pub struct SupabaseStorage {
    conf: GlitchConfigStorage,
    client: Client,
}

impl SupabaseStorage {
    pub fn new(conf: GlitchConfigStorage, client: Client) -> Self {
        SupabaseStorage { conf, client }
    }

    fn base_url(&self) -> &str {
        self.conf.url.trim_end_matches('/')
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String> {
        let Some(api_key) = &self.conf.api_key else {
            return Err(anyhow!("File uploads are not configured").into());
        };
        let url = format!("{}/storage/v1/object/{bucket}/{path}", self.base_url());
        let res = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .header("apikey", api_key)
            .header("x-upsert", "false")
            .header("cache-control", format!("max-age={}", self.conf.cache_control_secs))
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!("Upload to {bucket}/{path} failed with {status}: {body}");
            return Err(BackendError::from(anyhow!("Upload failed: {status}")));
        }
        Ok(self.public_url(bucket, path))
    }
}

/// Content type for an image extension, as returned by
/// [validate_image](crate::backend::utils::validate::validate_image).
pub fn image_content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_public_url() {
        let conf = GlitchConfigStorage {
            url: "https://project.supabase.co/".to_string(),
            ..Default::default()
        };
        let storage = SupabaseStorage::new(conf, Client::new());
        assert_eq!(
            "https://project.supabase.co/storage/v1/object/public/news-media/covers/1-a.png",
            storage.public_url("news-media", "covers/1-a.png")
        );
    }

    #[tokio::test]
    async fn test_upload_requires_key() {
        let storage = SupabaseStorage::new(GlitchConfigStorage::default(), Client::new());
        let res = storage
            .upload("avatars", "avatars/1-a.png", vec![1, 2, 3], "image/png")
            .await;
        assert!(res.is_err());
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!("image/jpeg", image_content_type("jpg"));
        assert_eq!("image/webp", image_content_type("webp"));
    }
}
