use std::sync::Arc;

use tracing::info;

use tokio_esi::config::Config;
use tokio_esi::esi::EsiProcessor;
use tokio_esi::handler::StaticHandler;
use tokio_esi::observability::Metrics;
use tokio_esi::server::Server;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    tokio_esi::logging::init(&config.logging);

    info!("Starting tokio_esi {}", tokio_esi::VERSION);
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics = Arc::new(Metrics::new()?);

    let handler = StaticHandler::new(&config.server.document_root, config.server.index_file.clone());
    let processor =
        EsiProcessor::from_config(handler, &config.esi).with_metrics(Arc::clone(&metrics));

    let server = Server::new(config.server, processor, metrics);
    run_server(&server).await
}

async fn run_server(
    server: &Server<StaticHandler>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let run = server.run();
    tokio::pin!(run);

    // Handle shutdown gracefully
    tokio::select! {
        result = &mut run => return result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            server.trigger_shutdown();
        }
    }

    run.await?;

    if server.wait_for_drain(server.drain_timeout()).await {
        info!("All connections drained");
    }

    Ok(())
}
