pub mod my_packages;
pub mod orders;
pub mod packages;
