pub mod catalog_sync;
pub mod gateways;
pub mod orders;
pub mod package_maintenance;
pub mod packages;
pub mod payments;
