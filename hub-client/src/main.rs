use chrono::Local;
use clap::{Parser, Subcommand};
use common::{HubConfig, HubError, Result};
use env_logger::fmt::Color;
use env_logger::Builder;
use hub_client::{log_reports, Discovery, HubSession, PollReport};
use log::{error, info, warn, LevelFilter};
use std::io::Write;
use std::net::Ipv4Addr;
use std::time::Duration;

const BANNER: &str = r#"
╔═══════════════════════════════════════════════════════════════════╗
║                                                                   ║
║    ██████╗ ██████╗ ███████╗██╗         ██╗  ██╗██╗   ██╗██████╗    ║
║    ██╔══██╗██╔══██╗██╔════╝██║         ██║  ██║██║   ██║██╔══██╗   ║
║    ██████╔╝██████╔╝█████╗  ██║         ███████║██║   ██║██████╔╝   ║
║    ██╔══██╗██╔══██╗██╔══╝  ██║         ██╔══██║██║   ██║██╔══██╗   ║
║    ██████╔╝██║  ██║███████╗███████╗    ██║  ██║╚██████╔╝██████╔╝   ║
║    ╚═════╝ ╚═╝  ╚═╝╚══════╝╚══════╝    ╚═╝  ╚═╝ ╚═════╝ ╚═════╝    ║
║                                                                   ║
║    Brel Home Hub Client v0.1.0                                    ║
╚═══════════════════════════════════════════════════════════════════╝
"#;

/// The level to force on top of `RUST_LOG`: `--debug` always wins, and
/// without it `Info` applies only when `RUST_LOG` is unset.
fn forced_level(debug: bool, rust_log: Option<&str>) -> Option<LevelFilter> {
    match (debug, rust_log) {
        (true, _) => Some(LevelFilter::Debug),
        (false, Some(spec)) if !spec.trim().is_empty() => None,
        (false, _) => Some(LevelFilter::Info),
    }
}

fn setup_logger(level: Option<LevelFilter>) {
    let mut builder = Builder::from_default_env();
    if let Some(level) = level {
        builder.filter(None, level);
    }

    builder
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            let mut level_style = buf.style();
            let mut target_style = buf.style();
            let mut message_style = buf.style();

            let level_color = match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Cyan,
                log::Level::Trace => Color::White,
            };

            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {} [{}] {}",
                timestamp_style.set_color(Color::Rgb(100, 100, 100)).value(timestamp),
                level_style.set_color(level_color).value(record.level()),
                target_style.set_color(Color::Blue).value(record.target()),
                message_style.set_color(Color::White).value(record.args())
            )
        })
        .init();
}

#[derive(Parser)]
#[command(name = "brel-hub", about = "Monitor and control a Brel Home Hub")]
struct Args {
    /// Last known hub address
    #[arg(long)]
    host: Option<Ipv4Addr>,

    /// 16-byte key from the Brel app
    #[arg(long)]
    key: Option<String>,

    /// Pre-derived access token, skips key derivation
    #[arg(long)]
    token: Option<String>,

    /// Any address in the /24 to scan for the hub
    #[arg(long)]
    subnet: Option<Ipv4Addr>,

    /// Log every datagram sent and received
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Locate the hub and print its address
    Discover,
    /// List devices known to the hub
    List,
    /// Read the status of device number N
    Status { device: String },
    /// Move device number N
    Set {
        device: String,
        #[arg(long)]
        position: Option<u8>,
        #[arg(long)]
        angle: Option<u8>,
    },
    /// Read every device once
    Poll,
    /// Print the raw JSON reply for device number N
    Raw { device: String },
    /// Print hub reports until Ctrl-C
    Listen,
    /// Listen for reports and poll all devices periodically until Ctrl-C
    Watch {
        #[arg(long, default_value_t = 600)]
        interval: u64,
    },
}

impl Args {
    fn apply(&self, config: &mut HubConfig) {
        if let Some(host) = self.host {
            config.host = Some(host);
        }
        if let Some(key) = &self.key {
            config.shared_key = Some(key.clone());
        }
        if let Some(token) = &self.token {
            config.access_token = Some(token.clone());
        }
        if let Some(subnet) = self.subnet {
            config.subnet = Some(subnet);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let rust_log = std::env::var("RUST_LOG").ok();
    setup_logger(forced_level(args.debug, rust_log.as_deref()));

    println!("{}", BANNER);

    let mut config = HubConfig::load()?;
    args.apply(&mut config);

    match run(args.command, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("❌ {}", e);
            Err(e)
        }
    }
}

async fn run(command: Command, config: HubConfig) -> Result<()> {
    match command {
        Command::Discover => discover(config).await?,
        Command::List => print_devices(&open_session(config).await?),
        Command::Status { device } => {
            let session = open_session(config).await?;
            let mac = session.registry().mac_from_selection(&device)?;
            let status = session.read_status(&mac).await?;
            println!("Status {}", mac);
            println!("  Position: {}", show(status.current_position, "%"));
            println!("  Angle:    {}", show(status.current_angle, "°"));
        }
        Command::Set { device, position, angle } => {
            let session = open_session(config).await?;
            let mac = session.registry().mac_from_selection(&device)?;
            let ack = session.set_value(&mac, position, angle).await?;
            println!("✔ Command acknowledged: {}", serde_json::to_string(&ack)?);
        }
        Command::Poll => print_poll(&open_session(config).await?.poll_all().await),
        Command::Raw { device } => {
            let session = open_session(config).await?;
            let mac = session.registry().mac_from_selection(&device)?;
            let reply = session.read_raw(&mac).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Listen => {
            let session = open_session(config).await?;
            let listener = session.start_report_listener(Some(log_reports())).await?;
            info!("Listening for hub reports, Ctrl-C to stop");
            wait_for_ctrl_c().await?;
            listener.shutdown().await;
        }
        Command::Watch { interval } => {
            let session = open_session(config).await?;
            let listener = session.start_report_listener(Some(log_reports())).await?;
            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => print_poll(&session.poll_all().await),
                    result = tokio::signal::ctrl_c() => {
                        result?;
                        break;
                    }
                }
            }
            listener.shutdown().await;
        }
    }
    Ok(())
}

async fn discover(config: HubConfig) -> Result<()> {
    let discovery = Discovery::new(config);
    let found = tokio::select! {
        found = discovery.discover() => found?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Discovery cancelled");
            return Ok(());
        }
    };
    println!("Hub found at {} (via {})", found.addr, found.via);
    Ok(())
}

/// Validates the config, locates the hub and loads its device list.
async fn open_session(config: HubConfig) -> Result<HubSession> {
    config.validate()?;
    info!("🔍 Looking for the hub...");
    let mut session = HubSession::connect(config).await?;
    info!("✓ Using hub at {}", session.host());
    session.list_devices().await?;
    Ok(session)
}

async fn wait_for_ctrl_c() -> Result<()> {
    tokio::signal::ctrl_c().await.map_err(HubError::from)
}

fn print_devices(session: &HubSession) {
    println!("📡 Devices discovered:");
    for (i, device) in session.registry().devices().iter().enumerate() {
        if device.is_hub {
            println!("  {}) {} [{}] (HUB)", i + 1, device.display_name(), device.mac);
        } else {
            println!(
                "  {}) {} [{}] (Type: {})",
                i + 1,
                device.display_name(),
                device.mac,
                device.device_type
            );
        }
    }
}

fn print_poll(report: &PollReport) {
    for (mac, status) in &report.succeeded {
        println!(
            "{}: position={} angle={} battery={} charging={} rssi={}",
            mac,
            show(status.current_position, ""),
            show(status.current_angle, ""),
            show(status.battery_level, ""),
            show(status.charging_state, ""),
            show(status.rssi, ""),
        );
    }
    for (mac, err) in &report.failed {
        println!("{}: failed ({})", mac, err);
    }
}

fn show(value: Option<i64>, unit: &str) -> String {
    value.map(|v| format!("{}{}", v, unit)).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_is_not_overridden_by_default() {
        assert_eq!(forced_level(false, Some("hub_client=trace")), None);
        assert_eq!(forced_level(false, Some("warn")), None);
    }

    #[test]
    fn test_default_and_debug_levels() {
        assert_eq!(forced_level(false, None), Some(LevelFilter::Info));
        assert_eq!(forced_level(false, Some("  ")), Some(LevelFilter::Info));
        assert_eq!(forced_level(true, Some("warn")), Some(LevelFilter::Debug));
    }
}
