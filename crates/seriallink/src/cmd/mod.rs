use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use seriallink_frame::PacketId;
use seriallink_link::{InterfaceRegistry, LinkConfig, SerialLink};

use crate::exit::{link_error, CliError, CliResult, INTERNAL, INTERRUPTED, USAGE};
use crate::output::OutputFormat;

pub mod monitor;
pub mod ping;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a ping request and wait for the matching reply.
    Ping(PingArgs),
    /// Print every diagnostic line and packet the device sends.
    Monitor(MonitorArgs),
    /// Send a single packet.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ping(args) => ping::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial port to open (e.g. /dev/ttyACM0, COM3).
    #[arg(long, short = 'p', env = "SERIALLINK_PORT")]
    pub port: String,
    /// Baud rate.
    #[arg(long, default_value = "9600")]
    pub baud: u32,
    /// Give up if the port does not open within this long (e.g. 10s, 500ms).
    /// Use "forever" to keep retrying.
    #[arg(long, default_value = "10s")]
    pub connect_timeout: String,
}

impl PortArgs {
    pub fn link_config(&self) -> CliResult<LinkConfig> {
        let connect_timeout = match self.connect_timeout.trim() {
            "forever" => None,
            other => Some(parse_duration(other)?),
        };
        Ok(LinkConfig::new(self.port.clone())
            .with_baud_rate(self.baud)
            .with_connect_timeout(connect_timeout))
    }
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Sequence number carried by the request.
    #[arg(long, default_value = "1")]
    pub seq: u32,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Exit after printing N items.
    #[arg(long)]
    pub count: Option<usize>,
    /// Only print packets (skip diagnostic lines).
    #[arg(long, conflicts_with = "lines_only")]
    pub packets_only: bool,
    /// Only print diagnostic lines (skip packets).
    #[arg(long)]
    pub lines_only: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Packet ID.
    #[arg(long)]
    pub id: PacketId,
    /// Payload as hex bytes (e.g. 39300000).
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Payload as raw text.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Wait for one packet with this ID and print it.
    #[arg(long, value_name = "ID")]
    pub wait: Option<PacketId>,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect a registered link for `args` and start its reader.
///
/// Ctrl-C closes every registered link and exits.
pub fn open_link(args: &PortArgs) -> CliResult<SerialLink> {
    let registry = Arc::new(InterfaceRegistry::new());
    install_ctrlc_handler(Arc::clone(&registry))?;

    let link = SerialLink::builder(args.link_config()?)
        .with_registry(registry)
        .connect()
        .map_err(|err| link_error("connect failed", err))?;
    link.start_reading()
        .map_err(|err| link_error("reader start failed", err))?;
    Ok(link)
}

fn install_ctrlc_handler(registry: Arc<InterfaceRegistry>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let closed = registry.close_all();
        tracing::info!(closed, "interrupted");
        std::process::exit(INTERRUPTED);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn forever_disables_connect_timeout() {
        let args = PortArgs {
            port: "COM3".to_string(),
            baud: 115_200,
            connect_timeout: "forever".to_string(),
        };
        let config = args.link_config().unwrap();
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.port.baud_rate, 115_200);

        let args = PortArgs {
            connect_timeout: "250ms".to_string(),
            ..args
        };
        assert_eq!(
            args.link_config().unwrap().connect_timeout,
            Some(Duration::from_millis(250))
        );
    }
}
