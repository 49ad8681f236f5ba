//! Purpose: `querygate` binary entry point.
//! Role: Parses args, loads config, builds the registry and MySQL connector, runs the server.
//! Invariants: Configuration is loaded once, before the listener accepts any request.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueHint, error::ErrorKind as ClapErrorKind};

use querygate::core::config::Config;
use querygate::core::error::{Error, ErrorKind, error_text, to_exit_code};
use querygate::core::registry::QueryRegistry;
use querygate::db::mysql::MySqlConnector;
use querygate::serve::{AppState, DEFAULT_BIND, ServeConfig, init_tracing, serve};

#[derive(Parser, Debug)]
#[command(
    name = "querygate",
    version,
    about = "Serve named SQL queries over HTTP as streaming CSV",
    after_help = r#"EXAMPLES
  $ querygate config.yaml
  $ CONFIG_FILE=config.yaml querygate --bind 127.0.0.1:9000
  $ curl 'http://127.0.0.1:8080/query?id=users'"#
)]
struct Cli {
    #[arg(
        env = "CONFIG_FILE",
        help = "Path to the YAML configuration file",
        value_hint = ValueHint::FilePath
    )]
    config: PathBuf,
    #[arg(long, default_value = DEFAULT_BIND, help = "Address to listen on")]
    bind: SocketAddr,
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", error_text(&err));
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(0);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Pass a config path or set CONFIG_FILE; see --help."));
            }
        },
    };

    init_tracing();

    let config = Config::load(&cli.config)?;
    tracing::info!(
        path = %cli.config.display(),
        database = ?config.database,
        queries = config.queries.len(),
        "loaded config"
    );

    let registry = QueryRegistry::from_config(&config.queries);
    let connector = MySqlConnector::from_config(&config.database);
    let state = AppState::new(registry, connector);
    tracing::info!(
        names = ?state.registry().names().collect::<Vec<_>>(),
        "query registry ready"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })?;
    runtime.block_on(serve(ServeConfig { bind: cli.bind }, state))?;
    Ok(0)
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim_start_matches("error: ").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}
