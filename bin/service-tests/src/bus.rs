//! ---
//! svctest_section: "06-command-line"
//! svctest_subsection: "binary"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Bus transport selection for the driver binary."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use svctest_config::{BusKind, DriverConfig};
use svctest_msg::{BusAddress, RecordingTransport, SessionTransport, Transport};
use tracing::info;

/// Open the configured bus, wrapped in a transcript recorder when requested.
pub fn connect(config: &DriverConfig) -> Result<Arc<dyn Transport>> {
    let address = bus_address(config);
    let session = SessionTransport::connect(&address, config.bus.call_timeout)
        .with_context(|| format!("unable to reach service {}", config.service.name))?;
    info!(bus = %address, service = %config.service.name, "connected");

    match &config.logging.transcript {
        Some(path) => {
            let recorder = RecordingTransport::create(session, path)
                .with_context(|| format!("unable to create transcript {}", path.display()))?;
            info!(transcript = %path.display(), "recording bus calls");
            Ok(Arc::new(recorder))
        }
        None => Ok(Arc::new(session)),
    }
}

fn bus_address(config: &DriverConfig) -> BusAddress {
    match config.bus.kind {
        BusKind::Session => BusAddress::Session,
        BusKind::System => BusAddress::System,
        BusKind::Address => BusAddress::Address(config.bus.address.clone().unwrap_or_default()),
    }
}
