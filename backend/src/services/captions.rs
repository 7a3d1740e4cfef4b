use crate::error::{AppError, AppResult};
use crate::utils::normalize_caption_fragments;
use log::{info, warn};
use yt_transcript_rs::api::YouTubeTranscriptApi;
use yt_transcript_rs::errors::CouldNotRetrieveTranscriptReason;

#[derive(Debug, Clone, PartialEq)]
pub struct Captions {
    pub text: String,
    pub language: String,
}

/// Source of raw transcripts for a video.
#[rocket::async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the first transcript available in `languages` (in order of preference).
    async fn fetch_captions(&self, video_id: &str, languages: &[String]) -> AppResult<Captions>;
}

pub struct YouTubeTranscripts;

#[rocket::async_trait]
impl TranscriptSource for YouTubeTranscripts {
    async fn fetch_captions(&self, video_id: &str, languages: &[String]) -> AppResult<Captions> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| AppError::TranscriptApi(format!("failed to create client: {e}")))?;
        let language_refs: Vec<&str> = languages.iter().map(String::as_str).collect();

        match api.fetch_transcript(video_id, &language_refs, false).await {
            Ok(transcript) => {
                let text =
                    normalize_caption_fragments(transcript.snippets.iter().map(|s| s.text.as_str()));
                Ok(Captions {
                    text,
                    language: transcript.language_code.clone(),
                })
            }
            Err(e) => {
                let failure = TranscriptFailure::of(e.reason.as_ref());
                Err(map_transcript_error(failure, &e.to_string(), languages))
            }
        }
    }
}

/// How a transcript lookup failed, as far as the pipeline cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TranscriptFailure {
    NotInLanguages,
    Disabled,
    Upstream,
}

impl TranscriptFailure {
    fn of(reason: Option<&CouldNotRetrieveTranscriptReason>) -> Self {
        match reason {
            Some(CouldNotRetrieveTranscriptReason::NoTranscriptFound { .. }) => {
                TranscriptFailure::NotInLanguages
            }
            Some(CouldNotRetrieveTranscriptReason::TranscriptsDisabled { .. }) => {
                TranscriptFailure::Disabled
            }
            _ => TranscriptFailure::Upstream,
        }
    }
}

/// Missing captions are the video's fault (422); anything else is the transcript service's (502).
fn map_transcript_error(failure: TranscriptFailure, detail: &str, languages: &[String]) -> AppError {
    match failure {
        TranscriptFailure::NotInLanguages => AppError::NoCaptions(format!(
            "no transcripts found in the preferred languages: {}",
            languages.join(", ")
        )),
        TranscriptFailure::Disabled => {
            AppError::NoCaptions("transcripts are disabled for this video".to_string())
        }
        TranscriptFailure::Upstream => AppError::TranscriptApi(detail.to_string()),
    }
}

/// Fetch and validate captions for `video_id`. Empty transcripts count as missing captions.
pub async fn extract_captions(
    source: &dyn TranscriptSource,
    video_id: &str,
    languages: &[String],
) -> AppResult<Captions> {
    let captions = source.fetch_captions(video_id, languages).await?;
    if captions.text.trim().is_empty() {
        warn!("Empty transcript received for video {video_id}");
        return Err(AppError::NoCaptions(format!(
            "transcript for {video_id} is empty"
        )));
    }

    info!(
        "Extracted {} characters of captions for {video_id} (language: {})",
        captions.text.len(),
        captions.language
    );
    Ok(captions)
}
