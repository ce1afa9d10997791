use futures::future::BoxFuture;

use super::{
    ImageKind, JobStatus, Judge, JudgeRequest, MediaGenerator, ProviderError, ProviderResult,
    RankRequest, Ranking, ScenarioRequest, ScriptRequest, TextWriter, Verdict, VideoScript,
    VideoService,
};

/// Stand-in for unconfigured collaborators: every call fails with [`ProviderError::Disabled`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

impl Judge for DisabledProvider {
    fn judge(&self, _request: JudgeRequest) -> BoxFuture<'static, ProviderResult<Verdict>> {
        Box::pin(async { Err(ProviderError::Disabled("judge")) })
    }

    fn rank(&self, _request: RankRequest) -> BoxFuture<'static, ProviderResult<Vec<Ranking>>> {
        Box::pin(async { Err(ProviderError::Disabled("judge")) })
    }
}

impl TextWriter for DisabledProvider {
    fn scenario(&self, _request: ScenarioRequest) -> BoxFuture<'static, ProviderResult<String>> {
        Box::pin(async { Err(ProviderError::Disabled("text")) })
    }

    fn video_script(
        &self,
        _request: ScriptRequest,
    ) -> BoxFuture<'static, ProviderResult<VideoScript>> {
        Box::pin(async { Err(ProviderError::Disabled("text")) })
    }
}

impl MediaGenerator for DisabledProvider {
    fn image(&self, _prompt: String, _kind: ImageKind) -> BoxFuture<'static, ProviderResult<String>> {
        Box::pin(async { Err(ProviderError::Disabled("image")) })
    }
}

impl VideoService for DisabledProvider {
    fn submit(
        &self,
        _prompt: String,
        _image_url: String,
    ) -> BoxFuture<'static, ProviderResult<String>> {
        Box::pin(async { Err(ProviderError::Disabled("video")) })
    }

    fn poll(&self, _job_id: String) -> BoxFuture<'static, ProviderResult<JobStatus>> {
        Box::pin(async { Err(ProviderError::Disabled("video")) })
    }
}
