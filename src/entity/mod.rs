//! SeaORM entities
//!
//! Every tenant-owned table carries a `store_id` column; access to those
//! tables goes through [`crate::scope`].

pub mod license;
pub mod order;
pub mod order_item;
pub mod payment_config;
pub mod product;
pub mod store;
pub mod variant;

pub use license::LicenseStatus;
pub use order::OrderStatus;
pub use store::StoreStatus;
