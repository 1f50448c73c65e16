pub mod stoplight;

use syncline_drivers::{DriverRegistry, DriverResult};
use tracing::info;

pub use stoplight::StoplightDriver;

/// Register every bundled source connector
pub fn register_default_drivers(registry: &mut DriverRegistry) -> DriverResult<()> {
    info!("📦 Registering default source drivers...");

    // Stoplight CRM
    StoplightDriver::register(registry)?;

    info!("✅ Registered {} source drivers", registry.source_types().len());
    Ok(())
}

/// Registry holding every bundled connector
pub fn default_registry() -> DriverResult<DriverRegistry> {
    let mut registry = DriverRegistry::new();
    register_default_drivers(&mut registry)?;
    Ok(registry)
}
