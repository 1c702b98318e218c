pub mod gateway;
pub mod memory;

pub use gateway::{CatalogError, CatalogGateway, CatalogItem};
pub use memory::InMemoryCatalog;
