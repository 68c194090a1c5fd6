use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Couldn't upload file")]
    Upload(#[from] actix_form_data::Error),

    #[error("Provided video id is invalid")]
    InvalidVideoId(#[source] uuid::Error),

    #[error("No files present in upload")]
    NoFiles,

    #[error("Only one video may be uploaded per request")]
    TooManyFiles,

    #[error("Uploaded file is missing a content type")]
    MissingContentType,

    #[error("Unsupported media type {0}, only video/mp4 is accepted")]
    UnsupportedMediaType(String),

    #[error("Upload exceeded the maximum file size")]
    TooLarge,

    #[error("Error authenticating request")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Video is owned by another user")]
    NotOwner,

    #[error("Requested a video that doesn't exist")]
    VideoNotFound,

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),

    #[error("Error in ffmpeg")]
    FfMpeg(#[from] crate::ffmpeg::FfMpegError),

    #[error("Error probing video")]
    Probe(#[from] crate::discover::ProbeError),

    #[error("Error in store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error in DB")]
    Repo(#[source] crate::repo::RepoError),

    #[error("Failed to record playback URL on video")]
    Persist(#[source] crate::repo::RepoError),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::InvalidVideoId(_) => ErrorCode::INVALID_VIDEO_ID,
            Self::NoFiles => ErrorCode::VALIDATE_NO_FILES,
            Self::TooManyFiles => ErrorCode::VALIDATE_TOO_MANY_FILES,
            Self::MissingContentType => ErrorCode::VALIDATE_CONTENT_TYPE,
            Self::UnsupportedMediaType(_) => ErrorCode::VALIDATE_CONTENT_TYPE,
            Self::TooLarge => ErrorCode::VALIDATE_FILE_SIZE,
            Self::Auth(e) => e.error_code(),
            Self::NotOwner => ErrorCode::NOT_OWNER,
            Self::VideoNotFound => ErrorCode::VIDEO_NOT_FOUND,
            Self::Io(_) => ErrorCode::IO_ERROR,
            Self::FfMpeg(e) => e.error_code(),
            Self::Probe(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Repo(e) => e.error_code(),
            Self::Persist(_) => ErrorCode::PERSIST_VIDEO,
        }
    }
}

impl From<crate::repo::RepoError> for UploadError {
    fn from(value: crate::repo::RepoError) -> Self {
        match value {
            crate::repo::RepoError::Missing => Self::VideoNotFound,
            e => Self::Repo(e),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            Some(
                UploadError::Upload(_)
                | UploadError::InvalidVideoId(_)
                | UploadError::NoFiles
                | UploadError::TooManyFiles
                | UploadError::MissingContentType
                | UploadError::UnsupportedMediaType(_)
                | UploadError::TooLarge,
            ) => StatusCode::BAD_REQUEST,
            Some(UploadError::FfMpeg(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::Probe(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::Auth(_)) => StatusCode::UNAUTHORIZED,
            Some(UploadError::NotOwner) => StatusCode::FORBIDDEN,
            Some(UploadError::VideoNotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": self.root_cause().to_string(),
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}
