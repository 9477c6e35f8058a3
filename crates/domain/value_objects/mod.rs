pub mod data_amounts;
pub mod enums;
pub mod esim_codes;
pub mod orders;
pub mod package_duplicates;
pub mod package_slugs;
pub mod packages;
pub mod reseller_packages;
pub mod slug_enforcement;
