//! Issue one Chassis Control command to a BMC over RMCP+.
//!
//! ```text
//! chassis-control 192.0.2.10 cycle --username admin --password secret
//! ```

use std::process::ExitCode;
use std::time::Duration;

use bmc::{ChassisControl, Client, PrivilegeLevel};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "chassis-control",
    version,
    about = "Power control for a BMC over IPMI v2.0 (RMCP+)"
)]
struct Cli {
    /// BMC address: host, host:port, ip or [ipv6]:port (port defaults to 623).
    address: String,

    /// Chassis action to perform.
    action: Action,

    #[arg(short = 'U', long)]
    username: String,

    #[arg(short = 'P', long, env = "IPMI_PASSWORD", hide_env_values = true)]
    password: String,

    /// Optional BMC key (Kg) for two-key logins.
    #[arg(short = 'k', long)]
    bmc_key: Option<String>,

    /// Per-call timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Cipher suites to offer, most preferred first.
    #[arg(short = 'C', long, value_delimiter = ',', default_values_t = [17u8, 3])]
    cipher_suites: Vec<u8>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    On,
    Off,
    Cycle,
    Reset,
    Interrupt,
    Softoff,
}

impl From<Action> for ChassisControl {
    fn from(action: Action) -> Self {
        match action {
            Action::On => ChassisControl::PowerUp,
            Action::Off => ChassisControl::PowerDown,
            Action::Cycle => ChassisControl::PowerCycle,
            Action::Reset => ChassisControl::HardReset,
            Action::Interrupt => ChassisControl::PulseDiagnostic,
            Action::Softoff => ChassisControl::AcpiSoft,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

fn run(cli: Cli) -> bmc::Result<()> {
    let mut builder = Client::builder_for(&cli.address)?
        .username(&cli.username)
        .password(&cli.password)
        .privilege_level(PrivilegeLevel::Operator)
        .timeout(Duration::from_millis(cli.timeout_ms))
        .cipher_suite_ids(&cli.cipher_suites)?;
    if let Some(kg) = &cli.bmc_key {
        builder = builder.bmc_key(kg);
    }

    let client = builder.build()?;
    let result = client.chassis_control(cli.action.into());
    // Close even when the command failed; the first error wins.
    let closed = client.close_session();
    result?;
    closed?;

    info!(action = ?cli.action, address = %cli.address, "chassis control sent");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "chassis control failed");
            ExitCode::FAILURE
        }
    }
}
