//! OpenAI adapters for script generation and speech synthesis.

use async_openai::{
    config::OpenAIConfig,
    types::{
        audio::{CreateSpeechRequest, SpeechModel, Voice},
        chat::{
            ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
            ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        },
    },
    Client,
};
use async_trait::async_trait;

use crate::error::{PipelineError, Result};

use super::{ScriptModel, SpeechSynthesizer};

/// Chat-completion backed script model.
pub struct OpenAiScriptModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiScriptModel {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ScriptModel for OpenAiScriptModel {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(2000u32)
            .temperature(0.7)
            .build()
            .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PipelineError::GenerationFailed("model returned no content".into()))?;

        Ok(content)
    }
}

/// Speech synthesis via the OpenAI TTS endpoint.
pub struct OpenAiSpeech {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiSpeech {
    pub fn new(client: Client<OpenAIConfig>, model: SpeechModel, voice: Voice) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            ..Default::default()
        };

        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e| PipelineError::SynthesisFailed(e.to_string()))?;

        Ok(response.bytes.to_vec())
    }
}
