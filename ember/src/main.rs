//! Process entry point: logging, configuration, content tables, the worker
//! pool and the network runtime come up, then the main thread becomes the
//! tick thread.

mod config;
mod network;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ember_core::chunk::map::ChunkMap;
use ember_core::tick::run_tick_loop;
use ember_core::{Core, TaskQueue};
use ember_protocol::frame::CompressionSettings;
use ember_registry::REGISTRY;

use crate::config::ServerConfig;
use crate::network::NetworkContext;

fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logger();
    log::info!("Starting Ember");

    let config = ServerConfig::load_or_create(Path::new("config/ember.json5"));

    // Freeze the content tables up front so the first chunk load does not
    // pay for it.
    let start = std::time::Instant::now();
    let state_count = REGISTRY.state_count();
    log::info!(
        "Registry loaded in {:?} ({} block states, {} items)",
        start.elapsed(),
        state_count,
        REGISTRY.items.len()
    );

    let tasks = TaskQueue::start(config.worker_threads);
    let chunks = ChunkMap::new(Arc::clone(&tasks), PathBuf::from(&config.world_root));
    let mut core = Core::new(chunks, Arc::clone(&tasks), config.max_players);

    let compression = config.compression.map(|settings| CompressionSettings {
        threshold: settings.threshold.get(),
        level: settings.level,
    });
    let network_context = Arc::new(NetworkContext {
        join_queue: Arc::clone(&core.join_queue),
        player_list: Arc::clone(&core.player_list),
        max_players: config.max_players,
        view_distance_cap: config.view_distance,
        motd: config.motd.clone(),
        compression,
    });

    let running = Arc::new(AtomicBool::new(true));
    let network_running = Arc::clone(&running);
    let bind_address = config.server_address.clone();

    // The network runtime lives on its own threads; the tick thread never
    // awaits.
    let network_thread = std::thread::Builder::new()
        .name("network".to_owned())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("Failed to build network runtime");
            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::bind(&bind_address).await {
                    Ok(listener) => listener,
                    Err(error) => {
                        log::error!("Failed to bind {bind_address}: {error}");
                        network_running.store(false, Ordering::SeqCst);
                        return;
                    }
                };
                log::info!("Listening on {bind_address}");
                tokio::select! {
                    () = network::run_listener(listener, network_context) => {}
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Interrupted");
                        network_running.store(false, Ordering::SeqCst);
                    }
                }
            });
        })?;

    log::info!("Entering tick loop");
    run_tick_loop(&mut core, || running.load(Ordering::SeqCst));

    log::info!("Goodbye!");
    drop(network_thread);
    Ok(())
}
