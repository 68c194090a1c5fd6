use crate::config::primitives::{LogFormat, Targets};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};
use url::Url;
use uuid::Uuid;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            log_spans,
            console_address,
            console_buffer_capacity,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            save_to,
            command,
        } = self;

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets,
                log_spans,
            },
            console: Console {
                address: console_address,
                buffer_capacity: console_buffer_capacity,
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets,
            },
        };

        match command {
            Command::Run(Run {
                address,
                jwt_secret,
                max_file_size,
                temporary_directory,
                media_process_timeout,
                metrics_prometheus_address,
                store,
            }) => {
                let server = Server {
                    address,
                    jwt_secret,
                    max_file_size,
                };

                let metrics = Metrics {
                    prometheus_address: metrics_prometheus_address,
                };

                let media = Media {
                    process_timeout: media_process_timeout,
                    temporary_directory,
                };

                let (store, repo) = match store {
                    Some(RunStore::ObjectStorage(RunObjectStorage { storage, repo })) => {
                        (Some(storage), repo)
                    }
                    None => (None, None),
                };

                Output {
                    config_format: ConfigFormat {
                        server,
                        tracing,
                        metrics,
                        media,
                        repo,
                        store,
                    },
                    operation: Operation::Run,
                    config_file,
                    save_to,
                }
            }
            Command::IssueToken(IssueToken {
                user_id,
                expires_in,
                jwt_secret,
            }) => Output {
                config_format: ConfigFormat {
                    server: Server {
                        jwt_secret,
                        ..Default::default()
                    },
                    tracing,
                    ..Default::default()
                },
                operation: Operation::IssueToken {
                    user_id,
                    expires_in,
                },
                config_file,
                save_to,
            },
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) operation: Operation,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub(crate) enum Operation {
    Run,
    IssueToken {
        user_id: Uuid,
        /// Seconds until the token stops validating
        expires_in: u64,
    },
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<Repo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<ObjectStorage>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwt_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_file_size: Option<usize>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    console: Console,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Targets>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    log_spans: bool,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Console {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buffer_capacity: Option<usize>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Targets>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
}

/// Run the tubely video service
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the tubely configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stdout
    #[arg(long)]
    log_spans: bool,

    /// Address and port to expose tokio-console metrics
    #[arg(long)]
    console_address: Option<SocketAddr>,
    /// Capacity of the console-subscriber Event Buffer
    #[arg(long)]
    console_buffer_capacity: Option<usize>,

    /// URL to send OpenTelemetry metrics
    #[arg(long)]
    opentelemetry_url: Option<Url>,
    /// Service Name to use for OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,
    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<Targets>,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the tubely web server
    Run(Run),

    /// Prints a signed access token for the given user
    IssueToken(IssueToken),
}

#[derive(Debug, Parser)]
struct Run {
    /// The address and port to bind the tubely web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The secret used to sign and validate access tokens
    #[arg(long)]
    jwt_secret: Option<String>,

    /// The maximum size, in megabytes, for a single uploaded video
    #[arg(long)]
    max_file_size: Option<usize>,

    /// The temporary directory tubely should use when processing videos
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// Timeout, in seconds, for any ffmpeg or ffprobe invocation
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// Whether to enable the prometheus scrape endpoint
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    #[command(subcommand)]
    store: Option<RunStore>,
}

#[derive(Debug, Parser)]
struct IssueToken {
    /// The user the token authenticates
    #[arg(short, long)]
    user_id: Uuid,

    /// How long, in seconds, the token remains valid
    #[arg(short, long, default_value_t = 60 * 60 * 24)]
    expires_in: u64,

    /// The secret used to sign the token
    #[arg(long)]
    jwt_secret: Option<String>,
}

/// Configure the backing object storage
#[derive(Debug, Subcommand)]
enum RunStore {
    /// Run tubely with the provided object storage
    ObjectStorage(RunObjectStorage),
}

/// Run tubely with the provided object storage
#[derive(Debug, Parser)]
struct RunObjectStorage {
    #[command(flatten)]
    storage: ObjectStorage,

    #[command(subcommand)]
    repo: Option<Repo>,
}

/// Configuration for data repositories
#[derive(Debug, Subcommand, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Repo {
    /// Run tubely with the provided sled-backed data repository
    Sled(Sled),
}

/// Configuration for Object Storage
#[derive(Clone, Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ObjectStorage {
    /// The base endpoint for the object storage, when not talking to AWS directly
    ///
    /// Examples:
    /// - `http://localhost:9000`
    /// - `https://s3.dualstack.eu-west-1.amazonaws.com`
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<Url>,

    /// Determines whether to use path style or virtualhost style for accessing objects
    ///
    /// When this is true, objects will be fetched from {endpoint}/{bucket_name}/{object}
    /// When false, objects will be fetched from {bucket_name}.{endpoint}/{object}
    #[arg(short, long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    use_path_style: bool,

    /// The bucket in which to store videos
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket_name: Option<String>,

    /// The region the bucket is located in
    ///
    /// For minio deployments, this can just be 'minio'
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,

    /// The Access Key for the user accessing the bucket
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    access_key: Option<String>,

    /// The secret key for the user accessing the bucket
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,

    /// The session token for accessing the bucket
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,

    /// The base URL playback links are built from, usually a CDN in front of the bucket
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    public_endpoint: Option<Url>,
}

/// Configuration for the sled-backed data repository
#[derive(Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sled {
    /// The path to store the sled database
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    /// The cache capacity, in bytes, allowed to sled for in-memory operations
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_capacity: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::{Args, Operation};
    use clap::Parser;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        Args::command().debug_assert();
    }

    #[test]
    fn issue_token_operation() {
        let args = Args::try_parse_from([
            "tubely",
            "issue-token",
            "--user-id",
            "0190a4d6-70e6-7b2e-9f0e-6f5b0d4bd6e1",
            "--expires-in",
            "60",
        ])
        .expect("valid arguments");

        let output = args.into_output();

        match output.operation {
            Operation::IssueToken {
                user_id,
                expires_in,
            } => {
                assert_eq!(user_id.to_string(), "0190a4d6-70e6-7b2e-9f0e-6f5b0d4bd6e1");
                assert_eq!(expires_in, 60);
            }
            Operation::Run => panic!("expected issue-token"),
        }
    }

    #[test]
    fn run_serializes_only_provided_values() {
        let args = Args::try_parse_from([
            "tubely",
            "run",
            "--jwt-secret",
            "hunter2",
            "object-storage",
            "--bucket-name",
            "tubely",
            "--public-endpoint",
            "https://cdn.example.com",
            "sled",
            "--path",
            "/tmp/tubely-sled",
        ])
        .expect("valid arguments");

        let output = args.into_output();
        let value = serde_json::to_value(&output.config_format).expect("serializable");

        assert_eq!(value["server"]["jwt_secret"], "hunter2");
        assert!(value["server"].get("address").is_none());
        assert_eq!(value["store"]["bucket_name"], "tubely");
        assert_eq!(value["repo"]["type"], "sled");
        assert_eq!(value["repo"]["path"], "/tmp/tubely-sled");
    }
}
