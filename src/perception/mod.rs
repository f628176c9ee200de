pub mod screenshot;
pub mod store;
pub mod traits;
pub mod types;
