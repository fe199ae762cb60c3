pub mod catalog;
pub mod license;
pub mod order;
pub mod quota;
pub mod store;
pub mod webhook;

pub use catalog::{Catalog, Listing};
pub use license::{License, NewLicense};
pub use order::{NewOrder, Order, Placed};
pub use quota::{Quota, Usage};
pub use store::Store;
pub use webhook::{Payments, WebhookAck};
