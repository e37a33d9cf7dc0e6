use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_hw::{Camera, FrameSource};
use std::time::Duration;

#[zbus::proxy(
    interface = "org.facegate.Kiosk1",
    default_service = "org.facegate.Kiosk1",
    default_path = "/org/facegate/Kiosk1"
)]
trait Kiosk {
    async fn status(&self) -> zbus::Result<String>;
    async fn scan_face(&self) -> zbus::Result<()>;
    async fn navigate(&self, path: &str) -> zbus::Result<String>;
    async fn logout(&self) -> zbus::Result<()>;
    async fn reload(&self) -> zbus::Result<()>;
    async fn dismiss(&self) -> zbus::Result<()>;
    async fn accounts(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facegate", about = "facegate kiosk face-login CLI")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
    /// Start scanning for a registered face
    Scan,
    /// Navigate to a route and print where the kiosk ended up
    Navigate {
        path: String,
    },
    /// Clear the stored session
    Logout,
    /// Purge caches and reload after an update
    Reload,
    /// Dismiss the update notice
    Dismiss,
    /// List registered accounts
    Accounts,
    /// List capture devices, optionally grabbing a test frame
    Devices {
        /// Capture one frame from this device
        #[arg(long)]
        capture: Option<String>,
    },
    /// Follow the kiosk prompts until interrupted
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 250)]
        interval: u64,
    },
}

async fn connect(system: bool) -> Result<KioskProxy<'static>> {
    tracing::debug!(system, "connecting to facegated");
    let builder = if system {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let conn = builder
        .method_timeout(Duration::from_secs(10))
        .build()
        .await
        .context("connecting to D-Bus")?;
    KioskProxy::new(&conn).await.context("facegated is not running")
}

fn print_status(raw: &str) -> Result<()> {
    let status: serde_json::Value = serde_json::from_str(raw)?;
    println!("phase:  {}", status["phase"].as_str().unwrap_or("?"));
    println!("route:  {}", status["route"].as_str().unwrap_or("?"));
    if let Some(name) = status["session"]["full_name"].as_str() {
        println!("logged in as {name}");
    }
    for line in status["headline"].as_array().into_iter().flatten() {
        println!("  {}", line.as_str().unwrap_or_default());
    }
    if let Some(toast) = status["toast"].as_str() {
        println!("[{toast}]");
    }
    Ok(())
}

fn devices(capture: Option<String>) -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No capture devices found");
    }
    for d in &devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }

    if let Some(path) = capture {
        let mut camera = Camera::open(&path, 640, 360)?;
        println!("{path}: {}x{} {:?}", camera.width, camera.height, camera.format);
        let frame = camera.capture()?;
        let mean = frame.data.iter().map(|&p| p as u64).sum::<u64>() / frame.data.len().max(1) as u64;
        println!(
            "frame {}: mean brightness {mean}{}",
            frame.sequence,
            if frame.is_dark() { " (dark)" } else { "" }
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Devices { capture } => devices(capture),
        command => run(command, cli.system).await,
    }
}

async fn run(command: Commands, system: bool) -> Result<()> {
    let kiosk = connect(system).await?;
    match command {
        Commands::Status { json } => {
            let raw = kiosk.status().await?;
            if json {
                println!("{raw}");
            } else {
                print_status(&raw)?;
            }
        }
        Commands::Scan => {
            kiosk.scan_face().await?;
            println!("Scanning started");
        }
        Commands::Navigate { path } => {
            println!("{}", kiosk.navigate(&path).await?);
        }
        Commands::Logout => {
            kiosk.logout().await?;
            println!("Logged out");
        }
        Commands::Reload => {
            kiosk.reload().await?;
            println!("Reloading");
        }
        Commands::Dismiss => kiosk.dismiss().await?,
        Commands::Accounts => {
            let accounts: serde_json::Value = serde_json::from_str(&kiosk.accounts().await?)?;
            for a in accounts.as_array().into_iter().flatten() {
                println!(
                    "{:<16} {}",
                    a["id"].as_str().unwrap_or_default(),
                    a["full_name"].as_str().unwrap_or_default()
                );
            }
        }
        Commands::Watch { interval } => {
            let mut last = String::new();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = tokio::time::sleep(Duration::from_millis(interval)) => {}
                }
                let raw = kiosk.status().await?;
                let status: serde_json::Value = serde_json::from_str(&raw)?;
                let view = format!("{} {} {}", status["phase"], status["route"], status["headline"]);
                if view != last {
                    print_status(&raw)?;
                    println!();
                    last = view;
                }
            }
        }
        Commands::Devices { capture } => devices(capture)?,
    }

    Ok(())
}
