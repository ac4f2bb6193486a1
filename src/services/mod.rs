pub mod alerts;
pub mod store;
