// src/gateway/cloudinary.rs

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use super::{BlobHandle, BlobStore, GatewayError};
use crate::config::CloudinaryConfig;

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
}

/// Blob storage backed by Cloudinary's signed upload API.
pub struct CloudinaryBlobStore {
    config: CloudinaryConfig,
    client: Client,
}

impl CloudinaryBlobStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }
}

/// `k=v` pairs joined with `&`, keys in ascending order.
pub fn signature_base(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<String>>()
        .join("&")
}

pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(signature_base(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cloudinary appends the format itself, so the id drops the file extension.
pub fn public_id_for(path: &str) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file,
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, stem),
        None => stem.to_string(),
    }
}

#[async_trait]
impl BlobStore for CloudinaryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<BlobHandle, GatewayError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| GatewayError::Upload("system clock is before the epoch".to_string()))?
            .as_secs();

        let public_id = public_id_for(path);
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.clone());
        params.insert("timestamp", timestamp.to_string());
        let signature = sign_params(&params, &self.config.api_secret);

        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type.unwrap_or("application/octet-stream"))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("public_id", public_id)
            .text("timestamp", timestamp.to_string())
            .text("signature", signature);

        tracing::debug!("Uploading {} to Cloudinary", path);
        let resp = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Network error while talking to Cloudinary: {}", e);
                GatewayError::Http(e)
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            tracing::error!(
                "Cloudinary upload failed: status={}, body={}",
                status,
                error_text
            );
            return Err(GatewayError::Upload(format!(
                "image server answered with status {}",
                status
            )));
        }

        let upload = resp.json::<CloudinaryUploadResponse>().await.map_err(|e| {
            tracing::error!("Unreadable Cloudinary upload response: {}", e);
            GatewayError::Upload("unreadable response from the image server".to_string())
        })?;

        tracing::info!("Uploaded {} -> {}", path, upload.secure_url);
        Ok(BlobHandle {
            path: path.to_string(),
            location: upload.secure_url,
        })
    }

    async fn retrievable_url(&self, handle: &BlobHandle) -> Result<String, GatewayError> {
        Ok(handle.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_base_is_sorted_by_key() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1700000000".to_string());
        params.insert("public_id", "listings/u1/1-a.png".to_string());
        assert_eq!(
            signature_base(&params),
            "public_id=listings/u1/1-a.png&timestamp=1700000000"
        );
    }

    #[test]
    fn public_id_drops_only_the_file_extension() {
        assert_eq!(public_id_for("listings/u1/1-lamp.png"), "listings/u1/1-lamp");
        assert_eq!(public_id_for("listings/u1/1-lamp.old.jpeg"), "listings/u1/1-lamp.old");
        assert_eq!(public_id_for("listings/u.1/1-lamp"), "listings/u.1/1-lamp");
        assert_eq!(public_id_for("lamp.png"), "lamp");
        assert_eq!(public_id_for("listings/u1/.hidden"), "listings/u1/.hidden");
    }

    #[test]
    fn signature_is_sha1_hex_of_base_and_secret() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1".to_string());

        let mut hasher = Sha1::new();
        hasher.update(b"timestamp=1shh");
        let expected = hex::encode(hasher.finalize());

        let signature = sign_params(&params, "shh");
        assert_eq!(signature, expected);
        assert_eq!(signature.len(), 40);
        assert_ne!(signature, sign_params(&params, "other"));
    }
}
