//! Record store and CSV loading.

pub mod loader;
pub mod store;

pub use loader::{load_sales_file, LoadReport};
pub use store::RecordStore;
