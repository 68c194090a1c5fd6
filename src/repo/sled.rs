use std::path::PathBuf;

use sled::{Db, Tree};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error_code::ErrorCode,
    future::WithMetrics,
    init_metrics::SLED_OPERATION,
    repo::{CreateVideo, RepoError, Video, VideoRepo},
};

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        let span = tracing::Span::current();

        async move {
            tokio::task::spawn_blocking(move || span.in_scope(|| ($expr).map_err(SledError::from)))
                .await
                .map_err(SledError::from)
                .and_then(|res| res)
        }
        .with_metrics(SLED_OPERATION)
        .await?
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in database")]
    Sled(#[from] sled::Error),

    #[error("Invalid video json")]
    Json(#[from] serde_json::Error),

    #[error("Operation panicked")]
    Panic,
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sled(_) | Self::Json(_) => ErrorCode::SLED_ERROR,
            Self::Panic => ErrorCode::PANIC,
        }
    }
}

impl From<tokio::task::JoinError> for SledError {
    fn from(_: tokio::task::JoinError) -> Self {
        SledError::Panic
    }
}

// - videos: video id -> video json
// - user_videos: user id ++ video id -> ()
#[derive(Clone)]
pub(crate) struct SledRepo {
    videos: Tree,
    user_videos: Tree,
    db: Db,
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}

impl SledRepo {
    #[tracing::instrument]
    pub(crate) fn build(path: PathBuf, cache_capacity: u64) -> Result<Self, SledError> {
        let db = sled::Config::new()
            .path(path)
            .cache_capacity(cache_capacity)
            .open()?;

        Self::new(db)
    }

    pub(crate) fn new(db: Db) -> Result<Self, SledError> {
        Ok(SledRepo {
            videos: db.open_tree("tubely-videos-tree")?,
            user_videos: db.open_tree("tubely-user-videos-tree")?,
            db,
        })
    }

    #[cfg(test)]
    pub(crate) fn temporary() -> Result<Self, SledError> {
        let db = sled::Config::new().temporary(true).open()?;

        Self::new(db)
    }
}

fn user_video_key(user_id: Uuid, video_id: Uuid) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(user_id.as_bytes());
    key[16..].copy_from_slice(video_id.as_bytes());
    key
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for SledRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        let next = self.db.generate_id().map_err(SledError::from)?;

        tracing::trace!("sled healthy, next id {next}");

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, video), fields(title = %video.title))]
    async fn create_video(&self, user_id: Uuid, video: CreateVideo) -> Result<Video, RepoError> {
        let now = OffsetDateTime::now_utc();

        let video = Video {
            id: Uuid::now_v7(),
            created_at: now,
            updated_at: now,
            title: video.title,
            description: video.description,
            user_id,
            thumbnail_url: None,
            video_url: None,
        };

        let bytes = serde_json::to_vec(&video).map_err(SledError::from)?;
        let id = video.id;
        let user_videos = self.user_videos.clone();

        b!(self.videos, {
            videos.insert(id.as_bytes(), bytes)?;
            user_videos.insert(user_video_key(user_id, id), b"1")?;

            Ok(()) as Result<(), SledError>
        });

        Ok(video)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn video(&self, id: Uuid) -> Result<Video, RepoError> {
        let opt = b!(self.videos, videos.get(id.as_bytes()));

        let bytes = opt.ok_or(RepoError::Missing)?;

        Ok(serde_json::from_slice(&bytes).map_err(SledError::from)?)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError> {
        let videos = self.videos.clone();

        let vec = b!(self.user_videos, {
            let mut vec = Vec::new();

            for res in user_videos.scan_prefix(user_id.as_bytes()) {
                let (key, _) = res?;

                let Some(bytes) = videos.get(&key[16..])? else {
                    continue;
                };

                vec.push(serde_json::from_slice::<Video>(&bytes)?);
            }

            Ok(vec) as Result<Vec<Video>, SledError>
        });

        Ok(vec)
    }

    #[tracing::instrument(level = "debug", skip(self, video), fields(id = %video.id))]
    async fn update_video(&self, video: &Video) -> Result<Video, RepoError> {
        let video = Video {
            updated_at: OffsetDateTime::now_utc(),
            ..video.clone()
        };

        let bytes = serde_json::to_vec(&video).map_err(SledError::from)?;
        let id = video.id;

        let previous = b!(
            self.videos,
            videos.fetch_and_update(id.as_bytes(), |prev| prev.map(|_| bytes.clone()))
        );

        if previous.is_none() {
            return Err(RepoError::Missing);
        }

        Ok(video)
    }
}
