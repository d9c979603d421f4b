//! ---
//! svctest_section: "06-command-line"
//! svctest_subsection: "binary"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Entrypoint running the sample-service checks."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use svctest_config::{BusKind, DriverConfig};
use svctest_logging as logging;
use svctest_msg::ServiceClient;
use svctest_testharness::{DriverSettings, FixtureStore, RunMode, TestDriver};
use tracing::info;

mod bus;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Check the D-Bus sample service against golden introspection fixtures",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'w',
        action = ArgAction::SetTrue,
        overrides_with = "write",
        help = "Record the introspection fixtures instead of verifying them"
    )]
    write: bool,

    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "ADDRESS", help = "Connect to this bus address instead of the session bus")]
    bus_address: Option<String>,

    #[arg(long, value_name = "DIR", help = "Directory holding the introspection fixtures")]
    fixtures_dir: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Append every bus call to this JSON-lines transcript")]
    transcript: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    ignored: Vec<String>,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.write {
            RunMode::Record
        } else {
            RunMode::Verify
        }
    }

    fn apply_overrides(&self, config: &mut DriverConfig) {
        if let Some(address) = &self.bus_address {
            config.bus.kind = BusKind::Address;
            config.bus.address = Some(address.clone());
        }
        if let Some(dir) = &self.fixtures_dir {
            config.fixtures.directory = dir.clone();
        }
        if let Some(path) = &self.transcript {
            config.logging.transcript = Some(path.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("service-tests {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let loaded = DriverConfig::load_with_source(cli.config.as_deref())?;
    let mut config = loaded.config;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .context("invalid command-line overrides")?;
    logging::init(config.logging.format, config.logging.filter.as_deref());

    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }
    if !cli.ignored.is_empty() {
        info!(arguments = ?cli.ignored, "ignoring extra arguments");
    }

    let transport = bus::connect(&config)?;
    let client = ServiceClient::new(transport, config.service.name.as_str());
    let driver = TestDriver::new(
        client,
        FixtureStore::from_config(&config.fixtures),
        DriverSettings::from_config(&config),
    );

    let mode = cli.mode();
    driver.run(mode)?;
    if mode == RunMode::Verify {
        println!("Ok");
    }
    Ok(())
}
