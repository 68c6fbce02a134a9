use anyhow::{Context, Result};
use clap::Parser;
use filesearch::{
    api,
    cli::{self, Cli, Command},
    config, logging,
    processing::FileSearchService,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();
    config.log_summary();

    let service = FileSearchService::new()
        .await
        .with_context(|| {
            format!("Failed to open store '{}'", config.store_display_name)
        })?;
    let mut stdout = std::io::stdout();

    match cli.command() {
        Command::Serve => serve(service, config.server_port).await,
        Command::Upload { paths } => {
            let summary = cli::run_upload(&service, paths, &mut stdout).await?;
            if summary.failed > 0 {
                anyhow::bail!("{} upload(s) failed", summary.failed);
            }
            Ok(())
        }
        Command::List => cli::run_list(&service, &mut stdout).await,
        Command::Clear => cli::run_clear(&service, &mut stdout).await,
        Command::Remove { filename } => cli::run_remove(&service, filename, &mut stdout).await,
        Command::Ask { question } => cli::run_ask(&service, question, &mut stdout).await,
    }
}

async fn serve(service: FileSearchService, port: Option<u16>) -> Result<()> {
    let store = service.store().id.clone();
    let app = api::create_router(Arc::new(service));
    let (listener, port) = bind_listener(port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!(store = %store, "Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")
}

async fn bind_listener(configured: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = configured {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
