use crate::api::{AssistantAnswer, ChatRequest, ImageRef, Resource, TranscriptMessage};
use crate::error::InferenceError;
use serde::{Deserialize, Serialize};

/// Body of a `runsync` job submission
#[derive(Clone, Debug, Serialize)]
pub struct RunsyncRequest {
    pub input: RunsyncInput,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunsyncInput {
    pub query: String,
    pub user: String,
    pub messages: Vec<TranscriptMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl RunsyncRequest {
    pub fn from_request(request: &ChatRequest) -> Self {
        RunsyncRequest {
            input: RunsyncInput {
                query: request.query.clone(),
                user: request.user.clone(),
                messages: request.messages.clone(),
                image_url: request.image_url.clone(),
            },
        }
    }
}

/// Job envelope returned by `runsync`
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RunsyncResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<RunsyncOutput>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RunsyncOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<AnswerBody>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AnswerBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<Resource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AnswerMetadata>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AnswerMetadata {
    #[serde(default)]
    pub grounding: bool,
}

impl TryFrom<RunsyncResponse> for AssistantAnswer {
    type Error = InferenceError;

    fn try_from(response: RunsyncResponse) -> Result<Self, Self::Error> {
        let Some(output) = response.output else {
            let status = response.status.as_deref().unwrap_or("unknown");
            let detail = response
                .error
                .map(|e| match e {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "no output".to_string());
            return Err(InferenceError::BadResponse(format!(
                "job status {}: {}",
                status, detail
            )));
        };

        let body = output
            .body
            .ok_or_else(|| InferenceError::BadResponse("output has no body".to_string()))?;

        let answer = match body.answer {
            Some(serde_json::Value::String(answer)) => answer,
            Some(other) => {
                return Err(InferenceError::BadResponse(format!(
                    "answer is not a string: {}",
                    other
                )));
            }
            None => return Err(InferenceError::BadResponse("body has no answer".to_string())),
        };

        Ok(AssistantAnswer {
            answer,
            resources: body.resources.unwrap_or_default(),
            images: body.images.unwrap_or_default(),
            grounding: body.metadata.unwrap_or_default().grounding,
        })
    }
}
