use anyhow::Result;
use tracing::debug;

use crate::capability::Generator;
use crate::transcript::Transcript;
use crate::{LlmClient, LlmRequest, DEFAULT_MAX_TOKENS};

/// Sends the whole transcript to a chat provider and returns the reply text.
pub struct LlmGenerator {
    client: LlmClient,
    max_tokens: u32,
}

impl LlmGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self::with_max_tokens(client, DEFAULT_MAX_TOKENS)
    }

    pub fn with_max_tokens(client: LlmClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }
}

impl Generator for LlmGenerator {
    fn generate(&self, transcript: &Transcript) -> Result<String> {
        let request = LlmRequest {
            messages: transcript.entries().to_vec(),
            max_tokens: Some(self.max_tokens),
        };
        let response = self.client.chat_blocking(&request)?;
        debug!(
            prompt_tokens = response.prompt_tokens,
            completion_tokens = response.completion_tokens,
            "generation step complete"
        );
        Ok(response.content)
    }
}
