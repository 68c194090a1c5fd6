mod auth;
mod config;
mod discover;
mod error;
mod error_code;
mod ffmpeg;
mod future;
mod geometry;
mod ingest;
mod init_metrics;
mod init_tracing;
mod media;
mod process;
mod repo;
mod state;
mod store;
mod tmp_file;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Instrument;
use tracing_actix_web::TracingLogger;
use uuid::Uuid;

use self::{
    auth::Authenticated,
    config::{Configuration, Operation},
    error::{Error, UploadError},
    ingest::Session,
    init_metrics::init_metrics,
    init_tracing::init_tracing,
    media::FfMpeg,
    repo::{CreateVideo, Repo},
    state::State,
    store::{object_store::ObjectStore, Store},
    tmp_file::TmpDir,
};

const MEGABYTES: usize = 1024 * 1024;

/// A configured tubely application, ready to install its tracing and metrics and run
pub struct TubelyConfiguration {
    config: Configuration,
    operation: Operation,
}

struct VideoUpload<S: Store + 'static>(Value<Session<S>>);

fn parse_video_id(req: &HttpRequest) -> Result<Uuid, uuid::Error> {
    req.match_info().query("video_id").parse()
}

impl<S: Store + 'static> FormData for VideoUpload<S> {
    type Item = Session<S>;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        let state = req
            .app_data::<web::Data<State<S>>>()
            .expect("No state in request")
            .clone();

        let video_id = parse_video_id(req).map_err(UploadError::InvalidVideoId)?;
        let user_id = auth::authenticate(req)?;

        let claimed = Arc::new(AtomicBool::new(false));

        // This form is expecting a single file field, 'video'
        Ok(Form::new()
            .max_files(1)
            .max_file_size(state.config.server.max_file_size * MEGABYTES)
            .transform_error(transform_error)
            .field(
                "video",
                Field::file(move |filename, content_type, stream| {
                    let state = state.clone();
                    let first = !claimed.swap(true, Ordering::AcqRel);

                    let span = tracing::info_span!("file-upload", ?filename, %video_id);

                    Box::pin(
                        async move {
                            if !first {
                                return Err(Error::from(UploadError::TooManyFiles));
                            }

                            let Some(content_type) = content_type else {
                                return Err(Error::from(UploadError::MissingContentType));
                            };

                            ingest::ingest(&*state, video_id, user_id, &content_type, stream).await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(VideoUpload(value))
    }
}

/// Accept one video file for an existing record and return the record with its playback url
#[tracing::instrument(name = "Upload video", skip(value, state))]
async fn upload_video<S: Store + 'static>(
    Multipart(VideoUpload(value)): Multipart<VideoUpload<S>>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let session = value
        .map()
        .and_then(|mut m| m.remove("video"))
        .and_then(|video| video.file())
        .ok_or(UploadError::NoFiles)?
        .result;

    let video = session.commit(&state.repo).await?;

    Ok(HttpResponse::Ok().json(&video))
}

#[tracing::instrument(name = "Create video", skip(state, body))]
async fn create_video<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    body: web::Json<CreateVideo>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video = state.repo.create_video(user_id, body.into_inner()).await?;

    Ok(HttpResponse::Created().json(&video))
}

#[tracing::instrument(name = "List videos", skip(state))]
async fn list_videos<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let videos = state.repo.videos_for_user(user_id).await?;

    Ok(HttpResponse::Ok().json(&videos))
}

#[tracing::instrument(name = "Fetch video", skip(req, state))]
async fn get_video<S: Store + 'static>(
    req: HttpRequest,
    Authenticated(user_id): Authenticated,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video_id = parse_video_id(&req).map_err(UploadError::InvalidVideoId)?;

    let video = state.repo.video(video_id).await?;

    if video.user_id != user_id {
        return Err(UploadError::NotOwner.into());
    }

    Ok(HttpResponse::Ok().json(&video))
}

#[tracing::instrument(name = "Checking health", skip(state))]
async fn healthz<S: Store + 'static>(state: web::Data<State<S>>) -> Result<HttpResponse, Error> {
    state.repo.health_check().await?;
    state.store.health_check().await?;

    Ok(HttpResponse::Ok().finish())
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

fn configure_endpoints<S: Store + 'static>(config: &mut web::ServiceConfig, state: State<S>) {
    config
        .app_data(web::Data::new(state.config.clone()))
        .app_data(web::Data::new(state))
        .route("/healthz", web::get().to(healthz::<S>))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/videos")
                        .route(web::post().to(create_video::<S>))
                        .route(web::get().to(list_videos::<S>)),
                )
                .service(web::resource("/videos/{video_id}").route(web::get().to(get_video::<S>)))
                .service(
                    web::resource("/video_upload/{video_id}")
                        .route(web::post().to(upload_video::<S>)),
                ),
        );
}

async fn launch<S: Store + 'static>(state: State<S>) -> std::io::Result<()> {
    let address = state.config.server.address;

    tracing::info!("Starting tubely on {address}");

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .wrap(TracingLogger::default())
            .configure(move |sc| configure_endpoints(sc, state))
    })
    .bind(address)?
    .run()
    .await
}

impl TubelyConfiguration {
    /// Build the tubely configuration from commandline arguments, environment and config file
    pub fn build_default() -> color_eyre::Result<Self> {
        let (config, operation) = config::configure()?;

        Ok(TubelyConfiguration { config, operation })
    }

    /// Install the default tubely tracer
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;
        }

        init_metrics();

        Ok(self)
    }

    /// Run the configured operation
    pub async fn run(self) -> color_eyre::Result<()> {
        let TubelyConfiguration { config, operation } = self;

        match operation {
            Operation::Run => (),
            Operation::IssueToken {
                user_id,
                expires_in,
            } => {
                let token = auth::issue_token(
                    user_id,
                    &config.server.jwt_secret,
                    Duration::from_secs(expires_in),
                )?;

                println!("{token}");

                return Ok(());
            }
        }

        let tmp_dir = TmpDir::init(&config.media.temporary_directory).await?;
        let repo = Repo::open(config.repo.clone())?;
        let store = ObjectStore::build(&config.store)?;
        let tools = FfMpeg::new(config.media.process_timeout);

        let state = State {
            config,
            tmp_dir: tmp_dir.clone(),
            repo: repo.to_arc(),
            store,
            tools: Arc::new(tools),
        };

        launch(state).await?;

        tmp_dir.cleanup().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
