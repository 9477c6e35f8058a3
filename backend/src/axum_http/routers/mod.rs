pub mod admin;
pub mod packages;
pub mod payments;
pub mod sync;
