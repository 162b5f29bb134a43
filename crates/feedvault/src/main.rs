mod cli;

use clap::Parser;
use cli::{Opts, OptsCmd};
use feedvault_server::{ApiServer, MediaConfig, ServerError};
use feedvault_wire::rpc::{Connection, RpcIdKnown};
use feedvault_wire::{CommandRequest, CommandResponse, WireError};
use snafu::{ResultExt, Snafu};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "feedvault::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Server error: {source}"))]
    Server { source: ServerError },
    #[snafu(display("Can not listen on {addr}: {source}"))]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[snafu(display("Rpc error: {source}"))]
    Rpc { source: WireError },
    #[snafu(display("Can not read media config {path}: {source}"))]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Can not parse media config {path}: {source}"))]
    ConfigParse {
        path: String,
        source: serde_json::Error,
    },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging();

    let opts = Opts::parse();
    match opts.cmd {
        OptsCmd::Serve {
            addr,
            db,
            media_config,
        } => {
            let media = media_config
                .map(|path| -> CliResult<MediaConfig> {
                    let display = path.display().to_string();
                    let raw = std::fs::read_to_string(&path).context(ConfigReadSnafu {
                        path: display.clone(),
                    })?;
                    serde_json::from_str(&raw).context(ConfigParseSnafu { path: display })
                })
                .transpose()?;

            let server = ApiServer::open(&db, media).context(ServerSnafu)?;
            server.start_background();

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .context(BindSnafu { addr: addr.clone() })?;

            tokio::select! {
                _ = server.clone().serve(listener) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!(target: LOG_TARGET, "Interrupted");
                }
            }
            server.shutdown().await;
        }
        OptsCmd::Admin { addr, command } => {
            let mut conn = Connection::connect(&addr).await.context(RpcSnafu)?;
            let response: CommandResponse = conn
                .call(
                    RpcIdKnown::Command,
                    &CommandRequest {
                        command,
                        arg: String::new(),
                    },
                )
                .await
                .context(RpcSnafu)?;
            println!("{}", response.message);
        }
    }

    Ok(())
}
