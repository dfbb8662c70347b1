pub mod auth;
pub mod compare;
pub mod competitors;
pub mod config;
pub mod errors;
pub mod http;
pub mod mapping;
pub mod model;
pub mod pending;
pub mod products;
pub mod store;

pub use compare::*;
pub use config::ClientConfig;
pub use errors::ApiError;
pub use model::*;
pub use pending::PendingSet;
pub use store::Store;
