use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    AdhocResult, BatchItemError, BatchReport, Channel, NewChannel, ProcessingStatus, Video,
};
use crate::services::captions::{extract_captions, Captions, TranscriptSource};
use crate::services::summarizer::{Summaries, Summarizer};
use crate::services::youtube::VideoPlatform;
use crate::services::{channel_service, video_service};
use crate::utils::{
    clamp_limit, extract_youtube_video_id, sanitize_text, DEFAULT_FAILED_REPROCESS,
    DEFAULT_VIDEOS_BATCH_PROCESS, MAX_VIDEOS_BATCH_PROCESS,
};
use log::{error, info, warn};
use std::sync::Arc;

/// Captions followed by summaries, with status bookkeeping in the catalog.
#[derive(Clone)]
pub struct Pipeline {
    transcripts: Arc<dyn TranscriptSource>,
    summarizer: Summarizer,
    languages: Vec<String>,
}

impl Pipeline {
    pub fn new(
        transcripts: Arc<dyn TranscriptSource>,
        summarizer: Summarizer,
        languages: Vec<String>,
    ) -> Self {
        Pipeline {
            transcripts,
            summarizer,
            languages,
        }
    }

    async fn captions_and_summaries(&self, external_id: &str) -> AppResult<(Captions, Summaries)> {
        let captions =
            extract_captions(self.transcripts.as_ref(), external_id, &self.languages).await?;
        let summaries = self
            .summarizer
            .summarize(&captions.text, &captions.language)
            .await?;
        Ok((captions, summaries))
    }

    /// Run the full pipeline for one catalogued video.
    ///
    /// The video must be `pending` or `failed`; anything else is a conflict and nothing is
    /// touched. A failing step leaves the video `failed` with the error recorded.
    pub async fn process_video(&self, db: &Database, video_id: i64) -> AppResult<Video> {
        let video = video_service::begin_processing(db, video_id).await?;
        info!("Processing video #{} '{}'", video.id, video.title);

        let outcome = match self.captions_and_summaries(&video.external_id).await {
            Ok((captions, summaries)) => video_service::mark_completed(
                db,
                video.id,
                &captions.text,
                &captions.language,
                &summaries.short,
                &summaries.detailed,
            )
            .await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(done) => {
                info!("Video #{} completed", done.id);
                Ok(done)
            }
            Err(e) => {
                error!("Video #{} failed: {e}", video.id);
                if let Err(mark_err) =
                    video_service::mark_failed(db, video.id, &e.to_string()).await
                {
                    error!("Could not record failure of video #{}: {mark_err}", video.id);
                }
                Err(e)
            }
        }
    }

    async fn process_batch(
        &self,
        db: &Database,
        status: ProcessingStatus,
        limit: usize,
    ) -> AppResult<BatchReport> {
        let videos = video_service::select_by_status(db, status, limit).await?;
        info!("Batch over {} {status} videos (limit {limit})", videos.len());

        let mut report = BatchReport {
            limit,
            total_processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        };

        for video in videos {
            match self.process_video(db, video.id).await {
                Ok(_) => report.successful += 1,
                // Another request picked it up in the meantime.
                Err(AppError::Conflict(_)) | Err(AppError::NotFound(_)) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(BatchItemError {
                        video_id: video.id,
                        external_id: video.external_id,
                        title: video.title,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.total_processed = report.successful + report.failed;

        info!(
            "Batch done: {} processed, {} successful, {} failed, {} skipped",
            report.total_processed, report.successful, report.failed, report.skipped
        );
        Ok(report)
    }

    pub async fn process_pending(&self, db: &Database, limit: Option<i64>) -> AppResult<BatchReport> {
        let limit = clamp_limit(limit, DEFAULT_VIDEOS_BATCH_PROCESS, MAX_VIDEOS_BATCH_PROCESS);
        self.process_batch(db, ProcessingStatus::Pending, limit).await
    }

    pub async fn reprocess_failed(&self, db: &Database, limit: Option<i64>) -> AppResult<BatchReport> {
        let limit = clamp_limit(limit, DEFAULT_FAILED_REPROCESS, MAX_VIDEOS_BATCH_PROCESS);
        self.process_batch(db, ProcessingStatus::Failed, limit).await
    }

    /// Captions and summaries for any video URL, optionally stored in the catalog.
    pub async fn process_url(
        &self,
        db: &Database,
        platform: &dyn VideoPlatform,
        video_url: &str,
        save: bool,
    ) -> AppResult<AdhocResult> {
        let external_id = extract_youtube_video_id(video_url)?;

        let details = if save {
            Some(platform.video_details(&external_id).await?)
        } else {
            None
        };

        let (captions, summaries) = self.captions_and_summaries(&external_id).await?;
        let mut result = AdhocResult {
            external_id: external_id.clone(),
            caption_language: captions.language.clone(),
            caption_text: captions.text.clone(),
            short_summary: summaries.short.clone(),
            detailed_summary: summaries.detailed.clone(),
            saved: false,
            video: None,
        };

        let Some(details) = details else {
            return Ok(result);
        };

        let channel = ensure_channel(db, platform, &details.channel_external_id).await?;
        video_service::insert_if_absent(db, channel.id, &details.video).await?;
        let stored = video_service::find_by_external_id(db, &external_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {external_id} not found")))?;

        match video_service::begin_processing(db, stored.id).await {
            Ok(_) => {}
            Err(AppError::Conflict(_)) => {
                info!(
                    "Video {external_id} is already {}, leaving it untouched",
                    stored.processing_status
                );
                result.video = Some(stored);
                return Ok(result);
            }
            Err(e) => return Err(e),
        }

        match video_service::mark_completed(
            db,
            stored.id,
            &captions.text,
            &captions.language,
            &summaries.short,
            &summaries.detailed,
        )
        .await
        {
            Ok(video) => {
                info!("Saved ad-hoc video {external_id} as #{}", video.id);
                result.saved = true;
                result.video = Some(video);
                Ok(result)
            }
            Err(e) => {
                if let Err(mark_err) =
                    video_service::mark_failed(db, stored.id, &e.to_string()).await
                {
                    error!("Could not record failure of video #{}: {mark_err}", stored.id);
                }
                Err(e)
            }
        }
    }

    pub async fn captions_for_url(&self, video_url: &str) -> AppResult<(String, Captions)> {
        let external_id = extract_youtube_video_id(video_url)?;
        let captions =
            extract_captions(self.transcripts.as_ref(), &external_id, &self.languages).await?;
        Ok((external_id, captions))
    }

    /// Summarize caller-supplied text. Without a language the first preferred one is assumed.
    pub async fn summarize_text(
        &self,
        caption_text: &str,
        language: Option<&str>,
    ) -> AppResult<Summaries> {
        let text = sanitize_text(caption_text);
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .or_else(|| self.languages.first().map(String::as_str))
            .unwrap_or("en");
        self.summarizer.summarize(&text, language).await
    }
}

async fn ensure_channel(
    db: &Database,
    platform: &dyn VideoPlatform,
    external_id: &str,
) -> AppResult<Channel> {
    if let Some(channel) = channel_service::find_by_external_id(db, external_id).await? {
        return Ok(channel);
    }

    let details = platform.channel_details(external_id).await?;
    let url = match details.custom_url.as_deref() {
        Some(handle) if handle.starts_with('@') => format!("https://www.youtube.com/{handle}"),
        _ => format!("https://www.youtube.com/channel/{}", details.external_id),
    };
    let new_channel = NewChannel {
        url,
        external_id: details.external_id,
        name: details.name,
        thumbnail_url: details.thumbnail_url,
    };
    match channel_service::insert_channel(db, &new_channel).await {
        Ok(channel) => {
            info!("Registered channel '{}' for an ad-hoc video", channel.name);
            Ok(channel)
        }
        Err(AppError::Conflict(_)) => {
            warn!("Channel {external_id} was registered concurrently");
            channel_service::find_by_external_id(db, external_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Channel {external_id} not found")))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewVideo;
    use crate::services::summarizer::TextGenerator;
    use crate::services::youtube::{ChannelDetails, UploadListing, VideoDetails};
    use crate::utils::ChannelRef;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const CHANNEL: &str = "UCaaaaaaaaaaaaaaaaaaaaaa";

    /// Captions for every id except those starting with "nocap".
    struct FakeTranscripts;

    #[rocket::async_trait]
    impl TranscriptSource for FakeTranscripts {
        async fn fetch_captions(&self, video_id: &str, _: &[String]) -> AppResult<Captions> {
            if video_id.starts_with("nocap") {
                return Err(AppError::NoCaptions("transcripts are disabled".to_string()));
            }
            Ok(Captions {
                text: format!("captions of {video_id}"),
                language: "en".to_string(),
            })
        }
    }

    /// Fails the detailed summary for captions mentioning "quota".
    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[rocket::async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, prompt: &str, _: u32) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("50 to 100 words") {
                Ok("short".to_string())
            } else if prompt.contains("quota") {
                Err(AppError::GenerationApi("quota exhausted".to_string()))
            } else {
                Ok("detailed".to_string())
            }
        }
    }

    struct FakePlatform;

    #[rocket::async_trait]
    impl VideoPlatform for FakePlatform {
        async fn resolve_channel_id(&self, _: &ChannelRef) -> AppResult<String> {
            Ok(CHANNEL.to_string())
        }

        async fn channel_details(&self, channel_id: &str) -> AppResult<ChannelDetails> {
            Ok(ChannelDetails {
                external_id: channel_id.to_string(),
                name: "Ad-hoc Channel".to_string(),
                thumbnail_url: None,
                custom_url: None,
            })
        }

        async fn recent_uploads(
            &self,
            _: &str,
            _: usize,
            _: Option<DateTime<Utc>>,
        ) -> AppResult<UploadListing> {
            Ok(UploadListing::default())
        }

        async fn video_details(&self, video_id: &str) -> AppResult<VideoDetails> {
            Ok(VideoDetails {
                video: NewVideo {
                    external_id: video_id.to_string(),
                    title: "Ad-hoc".to_string(),
                    thumbnail_url: None,
                    published_at: Some(Utc::now()),
                },
                channel_external_id: CHANNEL.to_string(),
                channel_name: "Ad-hoc Channel".to_string(),
            })
        }
    }

    struct Fixture {
        _dir: TempDir,
        db: Database,
        pipeline: Pipeline,
        generator: Arc<CountingGenerator>,
        channel_id: i64,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("digest.db")).await.unwrap();
        let generator = Arc::new(CountingGenerator::default());
        let pipeline = Pipeline::new(
            Arc::new(FakeTranscripts),
            Summarizer::new(generator.clone()),
            vec!["pl".to_string(), "en".to_string()],
        );
        let channel_id = channel_service::insert_channel(
            &db,
            &NewChannel {
                external_id: CHANNEL.to_string(),
                name: "Subscribed".to_string(),
                url: format!("https://www.youtube.com/channel/{CHANNEL}"),
                thumbnail_url: None,
            },
        )
        .await
        .unwrap()
        .id;
        Fixture {
            _dir: dir,
            db,
            pipeline,
            generator,
            channel_id,
        }
    }

    async fn add_video(f: &Fixture, external_id: &str) -> i64 {
        video_service::insert_if_absent(
            &f.db,
            f.channel_id,
            &NewVideo {
                external_id: external_id.to_string(),
                title: external_id.to_string(),
                thumbnail_url: None,
                published_at: Some(Utc::now()),
            },
        )
        .await
        .unwrap();
        video_service::find_by_external_id(&f.db, external_id)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[rocket::async_test]
    async fn successful_run_completes_video() {
        let f = fixture().await;
        let id = add_video(&f, "dQw4w9WgXcQ").await;

        let video = f.pipeline.process_video(&f.db, id).await.unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Completed);
        assert_eq!(video.caption_text.as_deref(), Some("captions of dQw4w9WgXcQ"));
        assert_eq!(video.short_summary.as_deref(), Some("short"));
        assert_eq!(video.detailed_summary.as_deref(), Some("detailed"));
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 2);
    }

    #[rocket::async_test]
    async fn missing_captions_fail_video_without_generation() {
        let f = fixture().await;
        let id = add_video(&f, "nocap000001").await;

        let err = f.pipeline.process_video(&f.db, id).await.unwrap_err();
        assert!(matches!(err, AppError::NoCaptions(_)));

        let video = video_service::get_video(&f.db, id).await.unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Failed);
        assert!(video.error_message.unwrap().contains("disabled"));
        assert!(video.short_summary.is_none());
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[rocket::async_test]
    async fn summary_failure_fails_video_without_partial_summaries() {
        let f = fixture().await;
        let id = add_video(&f, "quota000001").await;

        let err = f.pipeline.process_video(&f.db, id).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationApi(_)));
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 2);

        let video = video_service::get_video(&f.db, id).await.unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Failed);
        assert!(video.short_summary.is_none());
        assert!(video.detailed_summary.is_none());
        assert!(video.error_message.unwrap().contains("quota exhausted"));
    }

    #[rocket::async_test]
    async fn completed_video_is_not_reprocessed() {
        let f = fixture().await;
        let id = add_video(&f, "dQw4w9WgXcQ").await;
        f.pipeline.process_video(&f.db, id).await.unwrap();

        let err = f.pipeline.process_video(&f.db, id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 2);
    }

    #[rocket::async_test]
    async fn batch_respects_limit_and_counts_failures() {
        let f = fixture().await;
        for external_id in ["aaaaaaaaaaa", "nocap000001", "ccccccccccc", "ddddddddddd"] {
            add_video(&f, external_id).await;
        }

        let report = f.pipeline.process_pending(&f.db, Some(3)).await.unwrap();
        assert_eq!(report.limit, 3);
        assert_eq!(report.total_processed, 3);
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].external_id, "nocap000001");

        let stats = video_service::processing_stats(&f.db).await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);

        let retry = f.pipeline.reprocess_failed(&f.db, None).await.unwrap();
        assert_eq!(retry.limit, 5);
        assert_eq!(retry.failed, 1);
    }

    #[rocket::async_test]
    async fn adhoc_without_save_leaves_catalog_alone() {
        let f = fixture().await;
        let result = f
            .pipeline
            .process_url(&f.db, &FakePlatform, "https://youtu.be/dQw4w9WgXcQ", false)
            .await
            .unwrap();
        assert!(!result.saved);
        assert_eq!(result.short_summary, "short");
        assert_eq!(video_service::processing_stats(&f.db).await.unwrap().total, 0);
    }

    #[rocket::async_test]
    async fn adhoc_save_stores_completed_video_once() {
        let f = fixture().await;
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

        let first = f
            .pipeline
            .process_url(&f.db, &FakePlatform, url, true)
            .await
            .unwrap();
        assert!(first.saved);
        let video = first.video.unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Completed);
        assert_eq!(video.channel_id, f.channel_id);

        let second = f
            .pipeline
            .process_url(&f.db, &FakePlatform, url, true)
            .await
            .unwrap();
        assert!(!second.saved);
        assert_eq!(video_service::processing_stats(&f.db).await.unwrap().total, 1);
    }

    #[rocket::async_test]
    async fn invalid_url_is_rejected_before_any_call() {
        let f = fixture().await;
        let err = f
            .pipeline
            .process_url(&f.db, &FakePlatform, "https://example.com/video", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[rocket::async_test]
    async fn summarize_text_defaults_to_first_language() {
        let f = fixture().await;
        let summaries = f.pipeline.summarize_text("  some text  ", None).await.unwrap();
        assert_eq!(summaries.short, "short");
        assert!(matches!(
            f.pipeline.summarize_text("   ", Some("en")).await,
            Err(AppError::Validation(_))
        ));
    }
}
