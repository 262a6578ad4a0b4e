//! Message body transformation.

use serde::Deserialize;

/// Where the client-identification marker lands in the forwarded body.
///
/// Only the first message of a thread is marked; once a masking number is
/// assigned, the number itself disambiguates the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerPolicy {
    #[default]
    Append,
    Prepend,
}

impl MarkerPolicy {
    /// Attach the identity marker for `client_name` to `body`.
    pub fn apply(&self, body: &str, client_name: &str) -> String {
        match self {
            MarkerPolicy::Append => format!("{} From {} :", body, client_name),
            MarkerPolicy::Prepend => format!("From {} : {}", client_name, body),
        }
    }
}

/// Shorten a full name to first name plus last initial.
///
/// "John Smith" -> "John S.", "John" -> "John".
pub fn format_display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "Unknown" {
        return "Unknown".to_string();
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() < 2 {
        return parts[0].to_string();
    }

    let last_initial: String = parts[parts.len() - 1]
        .chars()
        .take(1)
        .flat_map(char::to_uppercase)
        .collect();

    format!("{} {}.", parts[0], last_initial)
}
