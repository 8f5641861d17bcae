use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use ludo_server::{serve, ServerConfig, ServerState};
use protocol::{Listener, TcpListener};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load(std::env::args().nth(1).map(PathBuf::from));

    // 初始化日志，RUST_LOG 优先于配置文件
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?
        .add_directive("ludo_server=debug".parse()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("飞行棋服务端启动中...");

    let addr = config.bind_addr();
    let cleanup_interval = config.cleanup_interval();
    let state = Arc::new(ServerState::new(config)?);

    // 定期清理没有人类玩家的房间
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            ticker.tick().await;
            let removed = sweeper.rooms.cleanup_empty_rooms();
            if removed > 0 {
                info!(removed, "empty rooms cleaned up");
            }
        }
    });

    let listener = TcpListener::bind(&addr).await?;
    tokio::select! {
        res = serve(listener, state) => res?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
