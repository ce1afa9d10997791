//! Image and video collaborators backed by the fal.ai HTTP API.
//!
//! Images use the synchronous endpoint; videos go through the queue API (submit, then poll the
//! request status and fetch the result once completed).

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    ImageKind, JobStatus, MediaGenerator, ProviderError, ProviderResult, VideoService,
};

const SYNC_BASE: &str = "https://fal.run";
const QUEUE_BASE: &str = "https://queue.fal.run";
const IMAGE_MODEL: &str = "fal-ai/flux/krea";
const VIDEO_MODEL: &str = "fal-ai/kling-video/v2.6/pro/image-to-video";
/// Queue status endpoints are addressed by application, without the model sub-path.
const VIDEO_APP: &str = "fal-ai/kling-video";

/// fal.ai client.
#[derive(Clone)]
pub struct FalClient {
    client: Client,
    key: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    images: Vec<ImageFile>,
}

#[derive(Debug, Deserialize)]
struct ImageFile {
    url: String,
}

#[derive(Debug, Deserialize)]
struct QueueSubmitted {
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct VideoResult {
    video: VideoFile,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    url: String,
}

impl FalClient {
    /// Build a client from `FAL_KEY`; `None` without a key.
    pub fn from_env() -> ProviderResult<Option<Self>> {
        let Some(key) = std::env::var("FAL_KEY").ok().filter(|key| !key.is_empty()) else {
            return Ok(None);
        };
        let client = Client::builder()
            .build()
            .map_err(|source| ProviderError::Http {
                endpoint: SYNC_BASE.into(),
                source: Box::new(source),
            })?;
        Ok(Some(Self {
            client,
            key: key.into(),
        }))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: String,
    ) -> ProviderResult<T> {
        let response = request
            .header("Authorization", format!("Key {}", self.key))
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                endpoint: endpoint.clone(),
                source: Box::new(source),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ProviderError::Http {
                endpoint,
                source: Box::new(source),
            })
    }

    async fn generate_image(&self, prompt: String) -> ProviderResult<String> {
        let endpoint = format!("{SYNC_BASE}/{IMAGE_MODEL}");
        let body = json!({
            "prompt": prompt,
            "image_size": "landscape_4_3",
            "num_inference_steps": 28,
        });
        let response: ImageResponse = self
            .send(self.client.post(&endpoint).json(&body), endpoint)
            .await?;
        response
            .images
            .into_iter()
            .next()
            .map(|image| image.url)
            .ok_or_else(|| ProviderError::Decode("image response without images".into()))
    }

    async fn submit_job(&self, prompt: String, image_url: String) -> ProviderResult<String> {
        let endpoint = format!("{QUEUE_BASE}/{VIDEO_MODEL}");
        let body = json!({
            "prompt": prompt,
            "image_url": image_url,
            "duration": "10",
            "aspect_ratio": "16:9",
            "generate_audio": true,
        });
        let submitted: QueueSubmitted = self
            .send(self.client.post(&endpoint).json(&body), endpoint)
            .await?;
        Ok(submitted.request_id)
    }

    async fn job_status(&self, job_id: String) -> ProviderResult<JobStatus> {
        let status_endpoint = format!("{QUEUE_BASE}/{VIDEO_APP}/requests/{job_id}/status");
        let status: QueueStatus = self
            .send(self.client.get(&status_endpoint), status_endpoint)
            .await?;

        match status.status.as_str() {
            "IN_QUEUE" | "IN_PROGRESS" => Ok(JobStatus::Pending),
            "COMPLETED" => {
                let result_endpoint = format!("{QUEUE_BASE}/{VIDEO_APP}/requests/{job_id}");
                let raw: Value = self
                    .send(self.client.get(&result_endpoint), result_endpoint)
                    .await?;
                match serde_json::from_value::<VideoResult>(raw) {
                    Ok(result) => Ok(JobStatus::Done(result.video.url)),
                    Err(_) => Ok(JobStatus::Failed),
                }
            }
            _ => Ok(JobStatus::Failed),
        }
    }
}

impl MediaGenerator for FalClient {
    fn image(&self, prompt: String, _kind: ImageKind) -> BoxFuture<'static, ProviderResult<String>> {
        let client = self.clone();
        Box::pin(async move { client.generate_image(prompt).await })
    }
}

impl VideoService for FalClient {
    fn submit(
        &self,
        prompt: String,
        image_url: String,
    ) -> BoxFuture<'static, ProviderResult<String>> {
        let client = self.clone();
        Box::pin(async move { client.submit_job(prompt, image_url).await })
    }

    fn poll(&self, job_id: String) -> BoxFuture<'static, ProviderResult<JobStatus>> {
        let client = self.clone();
        Box::pin(async move { client.job_status(job_id).await })
    }
}
