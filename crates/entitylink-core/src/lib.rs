#![forbid(unsafe_code)]
//! Record/Property data model, configuration loading, and error types shared
//! across the entitylink workspace.

pub mod config;
pub mod error;
pub mod model;

pub use error::EntityLinkError;
pub use model::{ComparatorRef, Configuration, LookupBehaviour, Property, PropertyRole, Record};
