//! Local persistence: keyed JSON records and the property store

pub mod kv;
pub mod properties;

pub use kv::{Change, KeyValues};
pub use properties::{PropertyStore, property};

#[cfg(test)]
mod tests;
