//! Wildcard topic matching
//!
//! `matches` decides whether a concrete topic is covered by a subscription
//! pattern. The trailing `#` rule compares raw string prefixes, not
//! segments: `ab#` matches `abc/x`. Brokers that follow the MQTT wildcard
//! rules treat that pattern differently.

// TODO: confirm the `#` prefix semantics against the broker's wildcard rules
// and switch to segment-aware matching if the literal prefix is unintended.

/// Returns `true` when `topic` is covered by `pattern`.
///
/// Exact equality always matches. A pattern without wildcards only matches
/// itself. A pattern ending in `#` matches every topic that starts with the
/// pattern minus the `#`. Otherwise both strings are split on `/` and must
/// have the same number of segments, each pattern segment being `+` or equal
/// to the topic segment.
pub fn matches(topic: &str, pattern: &str) -> bool {
    if pattern == topic {
        return true;
    }

    if !pattern.contains(['+', '#']) {
        return false;
    }

    if let Some(prefix) = pattern.strip_suffix('#') {
        return topic.starts_with(prefix);
    }

    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let topic_parts: Vec<&str> = topic.split('/').collect();

    pattern_parts.len() == topic_parts.len()
        && pattern_parts
            .iter()
            .zip(&topic_parts)
            .all(|(p, t)| *p == "+" || p == t)
}

/// Topic carrying readings of one sensor, or every sensor when `name` is `None`.
pub fn sensor_topic(name: Option<&str>) -> String {
    format!("sensors/{}", name.unwrap_or("+"))
}

/// Topic carrying the status of one device, or every device when `name` is `None`.
pub fn status_topic(name: Option<&str>) -> String {
    format!("status/{}", name.unwrap_or("+"))
}
