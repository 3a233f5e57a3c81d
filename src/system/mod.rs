pub mod cache;
pub mod collector;
pub mod platform;
pub mod provider;
pub mod snapshot;
