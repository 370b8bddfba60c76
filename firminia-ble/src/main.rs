//! BLE provisioning tool for FirminIA V3 devices
//!
//! Scans for FirminIA devices and sends them their configuration via BLE.

mod form;
mod logging;
mod wizard;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use firminia_ble_controller::{
    AnyTransport, ClientConfig, ConnectionManager, DeviceRegistry, FilePreferences, Locale,
    ScreenFlow, Session, TransportKind, firminia_home,
};

#[derive(Parser)]
#[command(name = "firminia-ble")]
#[command(about = "BLE provisioning tool for FirminIA V3 devices")]
struct Cli {
    /// Use a simulated device instead of the Bluetooth adapter
    #[arg(long, global = true)]
    simulate: bool,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for FirminIA devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Send a configuration to a device
    Provision {
        /// Device name or address to connect to (first match if omitted)
        #[arg(short, long)]
        device: Option<String>,
        /// Configuration form file (JSON)
        #[arg(short, long, default_value = "firminia.json")]
        file: PathBuf,
        /// Scan duration in seconds
        #[arg(long, default_value = "5")]
        duration: u64,
    },
    /// Show or change the preferred language (en, it, es, fr)
    Locale { code: Option<String> },
    /// Step through pairing and configuration interactively
    Wizard {
        /// Scan duration in seconds
        #[arg(long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::setup_logging(&cli.log_level)?;

    let transport_kind = if cli.simulate {
        TransportKind::Simulated
    } else {
        TransportKind::Bluetooth
    };
    let config = ClientConfig::new(firminia_home()?).with_transport(transport_kind);
    let mut session = Session::load(Box::new(FilePreferences::new(config.preferences_path())))?;

    match cli.command {
        Commands::Scan { duration } => {
            let config = config.with_scan_duration(Duration::from_secs(duration));
            scan_devices(&config).await?;
        }
        Commands::Provision { device, file, duration } => {
            let payload = form::read_form(&file, session.locale())?;
            payload.validate()?;
            let config = config.with_scan_duration(Duration::from_secs(duration));
            provision_device(&config, device, &payload).await?;
        }
        Commands::Locale { code } => match code {
            Some(code) => {
                let locale: Locale = code.parse()?;
                session.set_locale(locale)?;
                println!("Language set to {} ({})", locale.display_name(), locale.code());
            }
            None => {
                let locale = session.locale();
                println!("{} ({})", locale.display_name(), locale.code());
            }
        },
        Commands::Wizard { duration } => {
            let config = config.with_scan_duration(Duration::from_secs(duration));
            let transport = Arc::new(AnyTransport::from_config(&config).await);
            let flow = ScreenFlow::new(transport, &config, session);
            wizard::run(flow).await?;
        }
    }

    Ok(())
}

async fn scan_devices(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Scanning for FirminIA devices ({} seconds)...",
        config.scan_duration.as_secs()
    );

    let transport = Arc::new(AnyTransport::from_config(config).await);
    let mut registry = DeviceRegistry::new(transport, config.filter.clone());
    let devices = registry.scan().await?;

    println!("\nFound {} devices:", devices.len());
    for device in &devices {
        println!("  {} ({})", device.name, device.id);
    }
    Ok(())
}

async fn provision_device(
    config: &ClientConfig,
    target: Option<String>,
    payload: &firminia_proto::ConfigurationPayload,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for FirminIA devices...");

    let transport = Arc::new(AnyTransport::from_config(config).await);
    let mut registry = DeviceRegistry::new(Arc::clone(&transport), config.filter.clone());
    let devices = registry.scan().await?;

    let device = match &target {
        Some(t) => devices
            .iter()
            .find(|d| d.name.contains(t.as_str()) || d.id.contains(t.as_str()))
            .ok_or_else(|| format!("no FirminIA device matching {t:?}"))?,
        None => devices.first().ok_or("no FirminIA device found")?,
    };
    println!("Found device: {} ({})", device.name, device.id);

    let manager = ConnectionManager::new(transport, config.channel);
    println!("Connecting...");
    manager.connect(device).await?;
    println!("Connected!");

    println!("Sending configuration...");
    println!("  SSID: {}", payload.ssid);
    println!("  Server: {}:{}", payload.server, payload.port);
    let sent = manager.send(payload).await;
    manager.disconnect().await;
    sent?;

    println!("Configuration sent! The device will now join the network.");
    Ok(())
}
