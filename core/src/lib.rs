//! Shared domain types for the ORKL threat intelligence gateway: the closed
//! set of catalog entity kinds, the read-through cache of fetched records,
//! and the `threat://` resource address scheme over that cache.

pub mod cache;
pub mod entity;
pub mod error;
pub mod resource;

pub use cache::CacheStore;
pub use entity::EntityKind;
pub use error::AddressError;
pub use resource::ResourceAddress;
