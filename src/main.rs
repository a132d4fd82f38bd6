use std::net::SocketAddr;

use tracing::{info, warn};

use coursechat_backend::core::config::Config;
use coursechat_backend::core::logging;
use coursechat_backend::rag::RagSystem;
use coursechat_backend::server::build_router;
use coursechat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    logging::init(&config.log_dir);

    if config.anthropic_api_key.is_empty() {
        warn!("ANTHROPIC_API_KEY is not set; queries will fail until it is");
    }

    let rag = RagSystem::new(&config).await?;

    match rag.add_course_folder(&config.docs_dir, false).await {
        Ok((courses, chunks)) => {
            info!("Loaded {} new courses ({} chunks) from {}", courses, chunks, config.docs_dir.display());
        }
        Err(err) => warn!("Startup ingestion failed: {}", err),
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let router = build_router(AppState::new(config, rag));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router).await?;

    Ok(())
}
