pub mod captions;
pub mod channel_service;
pub mod fetcher;
pub mod processor;
pub mod prompts;
pub mod summarizer;
pub mod video_service;
pub mod youtube;
