//! Judge and text writer backed by an OpenAI-compatible chat-completions endpoint.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use super::{
    Judge, JudgeRequest, ProviderError, ProviderResult, RankRequest, Ranking, ScenarioRequest,
    ScriptRequest, TextWriter, Verdict, VideoScript, prompts,
};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "moonshotai/kimi-k2";

/// Chat-completions client shared by the judge and the writer.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: Arc<str>,
    api_key: Arc<str>,
    model: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RankingEnvelope {
    rankings: Vec<Ranking>,
}

impl OpenAiClient {
    /// Build a client from `LLM_API_KEY`, `LLM_BASE_URL` and `LLM_MODEL`; `None` without a key.
    pub fn from_env() -> ProviderResult<Option<Self>> {
        let Some(api_key) = std::env::var("LLM_API_KEY").ok().filter(|key| !key.is_empty())
        else {
            return Ok(None);
        };
        let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let client = Client::builder()
            .build()
            .map_err(|source| ProviderError::Http {
                endpoint: base_url.clone(),
                source: Box::new(source),
            })?;

        Ok(Some(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')).into(),
            api_key: api_key.into(),
            model: model.into(),
        }))
    }

    /// Configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: String, json_mode: bool) -> ProviderResult<String> {
        let mut body = json!({
            "model": self.model.as_ref(),
            "messages": [{ "role": "user", "content": prompt }],
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let endpoint = self.endpoint.to_string();
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(self.api_key.as_ref())
            .json(&body)
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

        let payload = response
            .json::<ChatResponse>()
            .await
            .map_err(|source| ProviderError::Http {
                endpoint,
                source: Box::new(source),
            })?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Decode("completion without content".into()))
    }

    async fn complete_json<T: DeserializeOwned>(&self, prompt: String) -> ProviderResult<T> {
        let raw = self.complete(prompt, true).await?;
        serde_json::from_str(strip_fences(&raw))
            .map_err(|err| ProviderError::Decode(format!("{err}: {raw}")))
    }
}

/// Some models wrap JSON answers in markdown fences even in JSON mode.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

impl Judge for OpenAiClient {
    fn judge(&self, request: JudgeRequest) -> BoxFuture<'static, ProviderResult<Verdict>> {
        let client = self.clone();
        Box::pin(async move { client.complete_json(prompts::judge(&request)).await })
    }

    fn rank(&self, request: RankRequest) -> BoxFuture<'static, ProviderResult<Vec<Ranking>>> {
        let client = self.clone();
        Box::pin(async move {
            let envelope: RankingEnvelope = client.complete_json(prompts::rank(&request)).await?;
            Ok(envelope.rankings)
        })
    }
}

impl TextWriter for OpenAiClient {
    fn scenario(&self, request: ScenarioRequest) -> BoxFuture<'static, ProviderResult<String>> {
        let client = self.clone();
        Box::pin(async move { client.complete(prompts::scenario(&request), false).await })
    }

    fn video_script(
        &self,
        request: ScriptRequest,
    ) -> BoxFuture<'static, ProviderResult<VideoScript>> {
        let client = self.clone();
        Box::pin(async move { client.complete_json(prompts::video_script(&request)).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_unwrapped() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn verdict_without_visual_prompt_decodes() {
        let verdict: Verdict =
            serde_json::from_str(r#"{"survived": true, "reason": "clever"}"#).unwrap();
        assert!(verdict.survived);
        assert!(verdict.visual_prompt.is_empty());
    }
}
