use crate::chain::FailoverChain;
use crate::extract::truncate_to_chars;
use safeagree_core::{ChatMessage, GenerationParams};
use std::sync::Arc;
use tracing::warn;

pub const ASSISTANT_SYSTEM_PROMPT: &str = r#"You are SafeAgree's AI Legal Assistant.
Your goal is to help users understand their legal documents (Terms of Service, Contracts, etc.) in simple, everyday language that anyone can understand.

Rules:
1. Speak like a helpful human, not a lawyer. Use "human words" - avoid complex jargon.
2. Use the provided "Document Context" to answer questions.
3. Be concise and clear. Explain things simply, as if explaining to a non-expert friend.
4. If the user asks for legal advice, politely decline and remind them you are an AI tool.
5. Format your responses with clear paragraphs or bullet points if needed."#;

/// Document context injected into the conversation is bounded separately from
/// the analysis cap; chat needs far less than the full document.
pub const MAX_CONTEXT_CHARS: usize = 50_000;

const APOLOGY: &str =
    "Sorry, I'm having trouble reaching the assistant right now. Please try again in a moment.";

/// Follow-up Q&A over an already-analyzed document. Reuses the same failover
/// chain as analysis with a more conversational temperature.
pub struct Assistant {
    chain: Arc<FailoverChain>,
    timeout_ms: u64,
}

impl Assistant {
    pub fn new(chain: Arc<FailoverChain>) -> Self {
        Self {
            chain,
            timeout_ms: 60_000,
        }
    }

    #[cfg(test)]
    fn with_timeout_ms(chain: Arc<FailoverChain>, timeout_ms: u64) -> Self {
        Self { chain, timeout_ms }
    }

    fn chat_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: Some(0.5),
            top_p: None,
            max_tokens: Some(1024),
            timeout_ms: self.timeout_ms,
        }
    }

    /// Always produces a message: on total provider failure the reply is a
    /// static apology, never an error the chat surface would render broken.
    pub async fn reply(&self, history: &[ChatMessage], context: &str) -> ChatMessage {
        let (bounded_context, _) = truncate_to_chars(context, MAX_CONTEXT_CHARS);
        let context_block = if bounded_context.trim().is_empty() {
            "DOCUMENT CONTEXT START:\nNo context provided.\nDOCUMENT CONTEXT END".to_string()
        } else {
            format!("DOCUMENT CONTEXT START:\n{bounded_context}\nDOCUMENT CONTEXT END")
        };

        let mut conversation = Vec::with_capacity(history.len() + 2);
        conversation.push(ChatMessage::system(ASSISTANT_SYSTEM_PROMPT));
        conversation.push(ChatMessage::system(context_block));
        conversation.extend_from_slice(history);

        match self.chain.run(&conversation, &self.chat_params()).await {
            Ok(content) => ChatMessage::assistant(content),
            Err(e) => {
                warn!(error = %e, "assistant reply failed, returning apology");
                ChatMessage::assistant(APOLOGY)
            }
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant").field("chain", &self.chain).finish()
    }
}
