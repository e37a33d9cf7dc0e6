use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod assets;
mod config;
mod dbus_interface;
mod engine;
mod fetch;
mod gallery;
mod kiosk;
mod schedule;
mod status;
mod store;
mod updater;

use config::{BusKind, Config};
use dbus_interface::{KioskService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = Config::from_env();
    tracing::debug!(?config, "configuration loaded");

    let registry = Arc::new(config::load_registry(&config.accounts_path)?);
    tracing::info!(path = %config.accounts_path.display(), accounts = registry.len(), "account registry loaded");

    let store = store::Store::open(&config.db_path).await?;
    let fetcher: Arc<dyn fetch::Fetcher> = Arc::new(fetch::HttpFetcher::new()?);

    let engine = engine::spawn_engine(engine::HardwareBackend {
        camera_device: config.camera_device.clone(),
        width: config.capture_width,
        height: config.capture_height,
    })?;

    let assets = assets::Assets::new(&config, &store, fetcher.clone());
    let updater = updater::Updater::new(&config, fetcher, Arc::new(fetch::SysfsConnectivity::new()));
    let kiosk = kiosk::Kiosk::new(
        &config,
        registry,
        engine,
        assets,
        store::SessionStore::new(store),
        updater,
    );

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, KioskService { kiosk: kiosk.clone() })?
        .build()
        .await?;
    tracing::info!(bus = ?config.bus, name = BUS_NAME, "D-Bus interface registered");

    let booting = kiosk.clone();
    tokio::spawn(async move {
        if let Err(e) = booting.boot().await {
            tracing::warn!(error = %e, "kiosk waiting for reload");
        }
        booting.updater().activate().await;
    });

    tracing::info!("facegated ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facegated shutting down");
    kiosk.shutdown().await;

    Ok(())
}
