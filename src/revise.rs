use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::llm::Completion;
use crate::memory::ArtifactEntry;
use crate::records::PostRecord;

const MAX_TOKENS: u32 = 2048;

/// Produces a revised draft for a rejected record, steering the completion
/// service with the client's feedback and retrieved approved posts.
pub struct ReviseEngine {
    llm: Arc<dyn Completion>,
    client_name: String,
}

impl ReviseEngine {
    pub fn new(llm: Arc<dyn Completion>, client_name: String) -> Self {
        Self { llm, client_name }
    }

    /// Revise the record's content. The returned text is guaranteed to
    /// differ from the input: an identical completion is retried once with a
    /// stronger instruction, and a second identical result surfaces as a
    /// no-progress error so the record is left for manual inspection.
    pub async fn revise(
        &self,
        record: &PostRecord,
        feedback: &str,
        context: &[ArtifactEntry],
    ) -> Result<String> {
        let prompt = self.build_prompt(record, feedback, context);
        debug!(
            record_id = %record.id,
            prompt_len = prompt.len(),
            context_count = context.len(),
            "requesting revision"
        );

        let first = self.llm.complete(&prompt, MAX_TOKENS, 0.7).await?;
        if first.trim() != record.content.trim() {
            info!(record_id = %record.id, "revision produced");
            return Ok(first.trim().to_string());
        }

        warn!(record_id = %record.id, "completion echoed the original, retrying");
        let retry_prompt = format!(
            "{}\n\nIMPORTANT: Your previous attempt repeated the original post \
            verbatim. The wording MUST change. Rewrite the post now, applying \
            the client's feedback.",
            prompt
        );
        let second = self.llm.complete(&retry_prompt, MAX_TOKENS, 0.9).await?;
        if second.trim() != record.content.trim() {
            info!(record_id = %record.id, "revision produced on retry");
            return Ok(second.trim().to_string());
        }

        Err(PipelineError::NoProgress(record.id.clone()).into())
    }

    fn build_prompt(
        &self,
        record: &PostRecord,
        feedback: &str,
        context: &[ArtifactEntry],
    ) -> String {
        let mut examples = String::new();
        if !context.is_empty() {
            examples.push_str(
                "Here are past posts this client approved. Match their tone and style:\n\n",
            );
            for (i, entry) in context.iter().enumerate() {
                let voice = entry.voice_quality.map_or("-".to_string(), |v| v.to_string());
                let quality = entry.post_quality.map_or("-".to_string(), |q| q.to_string());
                examples.push_str(&format!(
                    "Example {} (topic: {}, voice {}/10, quality {}/10):\n{}\n\n",
                    i + 1,
                    entry.topic,
                    voice,
                    quality,
                    entry.text
                ));
            }
        }

        format!(
            "You are {client}, a consultant who writes engaging, direct LinkedIn posts.\n\
            \n\
            REVISE THE EXISTING POST based on client feedback. Do NOT write a \
            completely new post.\n\
            \n\
            ORIGINAL POST:\n\
            {original}\n\
            \n\
            CLIENT FEEDBACK:\n\
            {feedback}\n\
            \n\
            INSTRUCTIONS:\n\
            - Keep the same core message, topic, and structure\n\
            - Make only the specific changes the feedback asks for\n\
            - If the feedback mentions tone or length, adjust accordingly\n\
            - Maintain the same voice and style\n\
            \n\
            {examples}\
            Return only the revised post text, nothing else.",
            client = self.client_name,
            original = record.content,
            feedback = feedback,
            examples = examples,
        )
    }
}
