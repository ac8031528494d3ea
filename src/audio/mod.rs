//! Speech synthesis and audio asset persistence.
//!
//! Scripts longer than the provider's input limit are split at
//! paragraph boundaries, synthesized chunk by chunk, and concatenated
//! in order before the asset is written to disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::adapters::SpeechSynthesizer;
use crate::core::retry::{with_retry, RetryPolicy};
use crate::domain::AudioAsset;
use crate::error::{PipelineError, Result};

pub struct AudioRenderer {
    tts: Arc<dyn SpeechSynthesizer>,
    retry: RetryPolicy,
    synthesis_timeout: Duration,
    audio_dir: PathBuf,
    base_url: String,
    words_per_minute: u32,
    max_chunk_chars: usize,
}

impl AudioRenderer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tts: Arc<dyn SpeechSynthesizer>,
        retry: RetryPolicy,
        synthesis_timeout: Duration,
        audio_dir: PathBuf,
        base_url: String,
        words_per_minute: u32,
        max_chunk_chars: usize,
    ) -> Self {
        Self {
            tts,
            retry,
            synthesis_timeout,
            audio_dir,
            base_url,
            words_per_minute,
            max_chunk_chars,
        }
    }

    /// Synthesize a script and persist the asset as `<episode_id>.mp3`.
    #[instrument(skip_all, fields(%episode_id))]
    pub async fn render(&self, episode_id: &str, script: &str) -> Result<AudioAsset> {
        let chunks = chunk_script(script, self.max_chunk_chars);
        debug!(chunks = chunks.len(), "Synthesizing script");

        let mut audio: Vec<u8> = Vec::new();
        for chunk in &chunks {
            let bytes = with_retry(&self.retry, |attempt| async move {
                debug!(attempt, "Invoking speech synthesis");
                let synthesize = self.tts.synthesize(chunk);
                tokio::time::timeout(self.synthesis_timeout, synthesize)
                    .await
                    .map_err(|_| {
                        PipelineError::SynthesisFailed("speech synthesis timed out".into())
                    })?
            })
            .await?;

            if bytes.is_empty() {
                return Err(PipelineError::SynthesisFailed(
                    "provider returned empty audio".into(),
                ));
            }
            audio.extend_from_slice(&bytes);
        }

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let filename = format!("{episode_id}.mp3");
        let path = self.audio_dir.join(&filename);
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&audio).await?;
        file.sync_all().await?;

        Ok(AudioAsset {
            path,
            url: format!("{}/audio/{filename}", self.base_url.trim_end_matches('/')),
            file_size_bytes: audio.len() as u64,
            duration_seconds: estimate_duration(script, self.words_per_minute),
        })
    }
}

/// Estimated playback length from word count at the speaking rate.
pub fn estimate_duration(script: &str, words_per_minute: u32) -> u32 {
    let words = script.split_whitespace().count() as f64;
    let minutes = words / f64::from(words_per_minute.max(1));
    (minutes * 60.0).round().max(1.0) as u32
}

/// Split a script into provider-sized chunks at paragraph boundaries.
///
/// A single paragraph over the limit is split at sentence boundaries as
/// a fallback, so every chunk stays within `max_chars`.
pub fn chunk_script(script: &str, max_chars: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in script.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let pieces = if paragraph.chars().count() > max_chars {
            split_sentences(paragraph, max_chars)
        } else {
            vec![paragraph.to_string()]
        };

        for piece in pieces {
            let needed = piece.chars().count() + if current.is_empty() { 0 } else { 2 };
            if !current.is_empty() && current.chars().count() + needed > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

fn split_sentences(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in paragraph.split_inclusive(['.', '!', '?']) {
        if !current.is_empty()
            && current.chars().count() + sentence.chars().count() > max_chars
        {
            pieces.push(current.trim().to_string());
            current = String::new();
        }
        current.push_str(sentence);

        // A single sentence over the limit gets a hard character split.
        while current.chars().count() > max_chars {
            let head: String = current.chars().take(max_chars).collect();
            current = current.chars().skip(max_chars).collect();
            pieces.push(head);
        }
    }

    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }
    pieces
}
