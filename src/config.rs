mod commandline;
mod defaults;
mod file;
mod primitives;

use clap::Parser;
use commandline::{Args, Output};
use config::Config;
use defaults::Defaults;

pub(crate) use commandline::Operation;
pub(crate) use file::{ConfigFile as Configuration, ObjectStorage, Repo, Sled, Tracing};
pub(crate) use primitives::LogFormat;

/// Build the configuration from defaults, an optional file, `TUBELY__` environment variables
/// and the command line, in increasing order of precedence
pub(crate) fn configure() -> color_eyre::Result<(Configuration, Operation)> {
    configure_args(Args::parse())
}

fn configure_args(args: Args) -> color_eyre::Result<(Configuration, Operation)> {
    let Output {
        config_format,
        operation,
        save_to,
        config_file,
    } = args.into_output();

    let config = Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(config::Environment::with_prefix("TUBELY").separator("__"))
        .add_source(config::Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok((config, operation))
}

#[cfg(test)]
pub(crate) fn test_configuration(jwt_secret: &str, max_file_size: u64) -> Configuration {
    Config::builder()
        .add_source(config::Config::try_from(&Defaults::default()).expect("defaults serialize"))
        .set_override("server.jwt_secret", jwt_secret)
        .and_then(|builder| builder.set_override("server.max_file_size", max_file_size))
        .and_then(|builder| builder.set_override("store.bucket_name", "tubely"))
        .and_then(|builder| builder.set_override("store.public_endpoint", "https://cdn.example.com/"))
        .and_then(|builder| builder.build())
        .and_then(|config| config.try_deserialize())
        .expect("valid test configuration")
}
