
use std::path::Path;

use actix_web::web::Bytes;
use futures_core::Stream;
use mime::Mime;
use streem::IntoStreamer;
use tokio::io::AsyncWriteExt;
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::{
    error::{Error, UploadError},
    future::WithMetrics,
    geometry::{self, Geometry},
    init_metrics::{
        FILES, INGEST_PERSIST, INGEST_PROBE, INGEST_REMUX, INGEST_SAVE, INGEST_STAGE,
        ORPHAN_CLEANUP,
    },
    repo::{ArcRepo, Video},
    state::State,
    store::{StorageKey, Store},
    tmp_file::TmpFile,
};

pub(crate) const ACCEPTED_CONTENT_TYPE: &str = "video/mp4";

const MEGABYTES: usize = 1024 * 1024;

/// An object that exists in the store but is not yet referenced by any video
///
/// Dropping it while armed schedules the object's removal
#[derive(Debug)]
struct StoredObject<S>
where
    S: Store + 'static,
{
    store: S,
    key: StorageKey,
    armed: bool,
}

impl<S> StoredObject<S>
where
    S: Store + 'static,
{
    fn new(store: S, key: StorageKey) -> Self {
        StoredObject {
            store,
            key,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<S> Drop for StoredObject<S>
where
    S: Store + 'static,
{
    fn drop(&mut self) {
        if self.armed {
            let store = self.store.clone();
            let key = self.key.clone();

            metrics::counter!(ORPHAN_CLEANUP).increment(1);

            let cleanup_span = tracing::info_span!(parent: None, "Remove orphaned object", %key);
            cleanup_span.follows_from(Span::current());

            tokio::task::spawn_local(
                async move {
                    if let Err(e) = store.remove(&key).await {
                        tracing::warn!("Failed to remove orphaned object {key}: {e}");
                    }
                }
                .instrument(cleanup_span),
            );
        }
    }
}

/// An upload that has been processed and stored, waiting for its playback URL to be recorded
///
/// Dropping it without committing removes the stored object
#[derive(Debug)]
pub(crate) struct Session<S>
where
    S: Store + 'static,
{
    video: Video,
    stored: StoredObject<S>,
}

impl<S> Session<S>
where
    S: Store + 'static,
{
    #[tracing::instrument(name = "Commit upload", skip_all, fields(id = %self.video.id))]
    pub(crate) async fn commit(self, repo: &ArcRepo) -> Result<Video, Error> {
        let Session { video, stored } = self;

        let video = repo
            .update_video(&video)
            .with_metrics(INGEST_PERSIST)
            .await
            .map_err(UploadError::Persist)?;

        stored.disarm();

        metrics::counter!(FILES).increment(1);
        tracing::info!(
            "Stored video {} at {}",
            video.id,
            video.video_url.as_deref().unwrap_or_default()
        );

        Ok(video)
    }
}

/// Run one upload through staging, fast-start remuxing, classification and storage
///
/// The video record is untouched until the returned session is committed
#[tracing::instrument(name = "Ingest", skip(state, stream))]
pub(crate) async fn ingest<S, St, E>(
    state: &State<S>,
    video_id: Uuid,
    user_id: Uuid,
    content_type: &Mime,
    stream: St,
) -> Result<Session<S>, Error>
where
    S: Store + 'static,
    St: Stream<Item = Result<Bytes, E>>,
    E: Into<Error>,
{
    let mut video = state.repo.video(video_id).await?;

    if video.user_id != user_id {
        return Err(UploadError::NotOwner.into());
    }

    if content_type.essence_str() != ACCEPTED_CONTENT_TYPE {
        return Err(UploadError::UnsupportedMediaType(content_type.to_string()).into());
    }

    let raw = state.tmp_dir.tmp_file(Some(".mp4"));
    let processed = state.tmp_dir.tmp_file(Some(".mp4"));

    let res = process_and_store(state, &raw, &processed, content_type, stream).await;

    cleanup(raw).await;
    cleanup(processed).await;

    let stored = res?;

    let url = state.store.public_url(&stored.key)?;
    video.video_url = Some(url.to_string());

    Ok(Session { video, stored })
}

async fn process_and_store<S, St, E>(
    state: &State<S>,
    raw: &TmpFile,
    processed: &TmpFile,
    content_type: &Mime,
    stream: St,
) -> Result<StoredObject<S>, Error>
where
    S: Store + 'static,
    St: Stream<Item = Result<Bytes, E>>,
    E: Into<Error>,
{
    let limit = state.config.server.max_file_size * MEGABYTES;

    stage(raw, stream, limit).with_metrics(INGEST_STAGE).await?;

    state
        .tools
        .fast_start(raw, processed)
        .with_metrics(INGEST_REMUX)
        .await?;

    let geometry: Geometry = geometry::classify(&*state.tools, processed)
        .with_metrics(INGEST_PROBE)
        .await?;

    let key = StorageKey::generate(geometry);

    state
        .store
        .save_file(&key, processed, content_type.essence_str())
        .with_metrics(INGEST_SAVE)
        .await?;

    Ok(StoredObject::new(state.store.clone(), key))
}

#[tracing::instrument(level = "debug", skip(stream))]
async fn stage<St, E>(path: &Path, stream: St, limit: usize) -> Result<(), Error>
where
    St: Stream<Item = Result<Bytes, E>>,
    E: Into<Error>,
{
    let mut file = tokio::fs::File::create(path).await?;

    let stream = std::pin::pin!(stream);
    let mut stream = stream.into_streamer();

    let mut written = 0;

    while let Some(mut bytes) = stream.try_next().await.map_err(Into::into)? {
        written += bytes.len();

        if written > limit {
            return Err(UploadError::TooLarge.into());
        }

        file.write_all_buf(&mut bytes).await?;
    }

    file.flush().await?;

    tracing::debug!("Staged {written} bytes");

    Ok(())
}

async fn cleanup(tmp_file: TmpFile) {
    if let Err(e) = tmp_file.cleanup().await {
        tracing::warn!("Failed to remove staging file: {e}");
    }
}
