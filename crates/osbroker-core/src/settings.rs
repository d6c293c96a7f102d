//! Settings maps and merge semantics.
//!
//! Provisioning and binding requests carry free-form parameter maps that are
//! merged with plan and service-definition settings to produce the effective
//! settings used against the storage gateway. The merge precedence is fixed:
//! request parameters first, then plan settings, then service-definition
//! settings; later layers win for overlapping keys.

use std::collections::BTreeMap;

use serde_json::Value;

/// A free-form settings map, as carried by catalog metadata and requests.
pub type Settings = serde_json::Map<String, Value>;

/// Sentinel meaning "unset" for quota limits and retention periods.
pub const UNSET: i64 = -1;

/// Settings key holding the quota sub-map.
pub const QUOTA: &str = "quota";
/// Quota sub-key for the hard limit.
pub const LIMIT: &str = "limit";
/// Quota sub-key for the warning threshold.
pub const WARN: &str = "warn";
/// Settings key holding the per-class retention map.
pub const RETENTION: &str = "retention";
/// Settings key holding the default retention period in seconds.
pub const DEFAULT_RETENTION: &str = "default-retention";
/// Request parameter naming a physical resource alias.
pub const NAME: &str = "name";
/// Request parameter carrying remote-connection credentials.
pub const REMOTE_CONNECTION: &str = "remote_connection";

/// Overlay `overlay` onto `base`, replacing overlapping keys.
pub fn merge_over(base: &mut Settings, overlay: &Settings) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}

/// Resolve the effective settings for a request: request parameters overlaid
/// with plan settings, overlaid with service-definition settings.
///
/// The `remote_connection` parameter is routing input, not a resource
/// setting, and is stripped from the result.
#[must_use]
pub fn resolve(
    parameters: &Settings,
    plan_settings: &Settings,
    service_settings: &Settings,
) -> Settings {
    let mut merged = parameters.clone();
    merged.remove(REMOTE_CONNECTION);
    merge_over(&mut merged, plan_settings);
    merge_over(&mut merged, service_settings);
    merged
}

/// Look up a string-valued setting.
#[must_use]
pub fn str_value<'a>(settings: &'a Settings, key: &str) -> Option<&'a str> {
    settings.get(key).and_then(Value::as_str)
}

/// Look up a boolean-valued setting.
#[must_use]
pub fn bool_value(settings: &Settings, key: &str) -> Option<bool> {
    settings.get(key).and_then(Value::as_bool)
}

/// Look up an integer-valued setting.
#[must_use]
pub fn int_value(settings: &Settings, key: &str) -> Option<i64> {
    settings.get(key).and_then(Value::as_i64)
}

/// Extract the quota `(limit, warn)` pair, if a quota sub-map is present.
/// Missing sub-keys default to [`UNSET`].
#[must_use]
pub fn quota(settings: &Settings) -> Option<(i64, i64)> {
    let quota = settings.get(QUOTA)?.as_object()?;
    let limit = quota.get(LIMIT).and_then(Value::as_i64).unwrap_or(UNSET);
    let warn = quota.get(WARN).and_then(Value::as_i64).unwrap_or(UNSET);
    Some((limit, warn))
}

/// Extract the per-class retention map, if present. Classes with non-integer
/// periods are skipped.
#[must_use]
pub fn retention_classes(settings: &Settings) -> BTreeMap<String, i64> {
    settings
        .get(RETENTION)
        .and_then(Value::as_object)
        .map(|classes| {
            classes
                .iter()
                .filter_map(|(name, period)| period.as_i64().map(|p| (name.clone(), p)))
                .collect()
        })
        .unwrap_or_default()
}

/// The instance alias carried by a `name` parameter, or the empty string.
#[must_use]
pub fn instance_alias(parameters: &Settings) -> String {
    parameters
        .get(NAME)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}
