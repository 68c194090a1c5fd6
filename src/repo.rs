use std::{fmt::Debug, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{config, error_code::ErrorCode};

pub(crate) mod sled;

pub(crate) type ArcRepo = Arc<dyn VideoRepo>;

#[derive(Clone, Debug)]
pub(crate) enum Repo {
    Sled(self::sled::SledRepo),
}

/// A video as clients see it
///
/// `video_url` is the only field the ingest pipeline ever writes
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Video {
    pub(crate) id: Uuid,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,

    pub(crate) title: String,

    pub(crate) description: String,

    pub(crate) user_id: Uuid,

    pub(crate) thumbnail_url: Option<String>,

    pub(crate) video_url: Option<String>,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub(crate) struct CreateVideo {
    pub(crate) title: String,

    #[serde(default)]
    pub(crate) description: String,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in sled")]
    SledError(#[from] self::sled::SledError),

    #[error("Requested video does not exist")]
    Missing,
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
            Self::Missing => ErrorCode::VIDEO_NOT_FOUND,
        }
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait VideoRepo: Debug + Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;

    async fn create_video(&self, user_id: Uuid, video: CreateVideo) -> Result<Video, RepoError>;

    /// Fetch a video, failing with [`RepoError::Missing`] when no record exists
    async fn video(&self, id: Uuid) -> Result<Video, RepoError>;

    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError>;

    /// Replace an existing record, refreshing its `updated_at`
    async fn update_video(&self, video: &Video) -> Result<Video, RepoError>;
}

#[async_trait::async_trait(?Send)]
impl<T> VideoRepo for Arc<T>
where
    T: VideoRepo + ?Sized,
{
    async fn health_check(&self) -> Result<(), RepoError> {
        T::health_check(self).await
    }

    async fn create_video(&self, user_id: Uuid, video: CreateVideo) -> Result<Video, RepoError> {
        T::create_video(self, user_id, video).await
    }

    async fn video(&self, id: Uuid) -> Result<Video, RepoError> {
        T::video(self, id).await
    }

    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError> {
        T::videos_for_user(self, user_id).await
    }

    async fn update_video(&self, video: &Video) -> Result<Video, RepoError> {
        T::update_video(self, video).await
    }
}

impl Repo {
    #[tracing::instrument]
    pub(crate) fn open(config: config::Repo) -> color_eyre::Result<Self> {
        match config {
            config::Repo::Sled(config::Sled {
                path,
                cache_capacity,
            }) => {
                let repo = self::sled::SledRepo::build(path, cache_capacity)?;

                Ok(Self::Sled(repo))
            }
        }
    }

    pub(crate) fn to_arc(&self) -> ArcRepo {
        match self {
            Self::Sled(sled_repo) => Arc::new(sled_repo.clone()),
        }
    }
}
