//! Process entry point: load config, build the application graph, serve
//! HTTP.

use tradecore::app;
use tradecore::config::Config;
use tradecore::supervisor::shutdown_requested;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    let port = config.port;
    let (router, supervisor) = app::build(&config).await?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("listening on 0.0.0.0:{port}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_requested())
        .await?;

    log::info!("http server stopped, shutting down background tasks");
    supervisor.shutdown().await;

    Ok(())
}
