//! Physical resource naming.
//!
//! Every physical name the broker creates carries the configured prefix.
//! Instances and binding users share the same aliasing rule: with an alias
//! the qualified name is `<prefix><alias>-<id>`, without it
//! `<prefix><id>`.

pub use osbroker_core::instance::resource_name;

/// Apply the configured prefix to an unprefixed resource name.
#[must_use]
pub fn prefixed(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

/// Assemble the fully qualified physical name for an id and optional alias.
#[must_use]
pub fn qualified(prefix: &str, id: &str, alias: &str) -> String {
    prefixed(prefix, &resource_name(id, alias))
}
