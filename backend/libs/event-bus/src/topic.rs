//! Topic-exchange routing rules
//!
//! Routing keys and binding patterns are dot-delimited words. In a pattern
//! `*` matches exactly one word and `#` matches zero or more words.

use crate::{BusError, Result};

/// Check whether `routing_key` is delivered to a queue bound with `pattern`.
///
/// # Example
///
/// ```
/// use event_bus::topic::matches;
///
/// assert!(matches("post.deleted", "post.deleted"));
/// assert!(matches("post.*", "post.deleted"));
/// assert!(matches("#", "post.deleted"));
/// assert!(!matches("post.created", "post.deleted"));
/// ```
pub fn matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}

/// Validate a routing key used for publishing (no wildcards, no empty words).
pub fn validate_routing_key(routing_key: &str) -> Result<()> {
    if routing_key.len() > 255 {
        return Err(BusError::InvalidRoutingKey(format!(
            "routing key longer than 255 bytes: {}",
            routing_key
        )));
    }

    let valid = routing_key
        .split('.')
        .all(|word| !word.is_empty() && word != "*" && word != "#");

    if !valid {
        return Err(BusError::InvalidRoutingKey(format!(
            "expected dot-delimited words without wildcards: {:?}",
            routing_key
        )));
    }

    Ok(())
}

/// Validate a binding pattern (wildcards allowed as whole words only).
pub fn validate_pattern(pattern: &str) -> Result<()> {
    let valid = pattern.split('.').all(|word| {
        !word.is_empty() && (word == "*" || word == "#" || !word.contains(['*', '#']))
    });

    if !valid || pattern.len() > 255 {
        return Err(BusError::InvalidRoutingKey(format!(
            "invalid binding pattern: {:?}",
            pattern
        )));
    }

    Ok(())
}
