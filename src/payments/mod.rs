pub mod error;
pub mod provider;
pub mod providers;
pub mod router;
pub mod types;
pub mod utils;
