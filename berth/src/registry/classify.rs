//! Service name classification.
//!
//! Names are matched against one ordered keyword table and the first hit
//! wins, so a name matching several keywords (`cache-db`) always lands on
//! the earlier entry (`redis`). Short keywords only match whole
//! `-`/`_`/`.`-separated tokens so `ui` does not fire on `build`.

/// How a keyword is compared with a service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    /// Anywhere in the name.
    Substring,
    /// Equal to one token of the name.
    Token,
}

use Match::{Substring, Token};

/// Ordered `(keyword, match kind, service type)` table.
const KEYWORDS: &[(&str, Match, &str)] = &[
    ("gateway", Substring, "gateway"),
    ("websocket", Substring, "websocket"),
    ("socket", Substring, "websocket"),
    ("realtime", Substring, "websocket"),
    ("worker", Substring, "worker"),
    ("job", Token, "worker"),
    ("postgres", Substring, "postgres"),
    ("mysql", Substring, "mysql"),
    ("mariadb", Substring, "mysql"),
    ("mongo", Substring, "mongodb"),
    ("redis", Substring, "redis"),
    ("cache", Substring, "redis"),
    ("elastic", Substring, "elasticsearch"),
    ("rabbit", Substring, "rabbitmq"),
    ("amqp", Substring, "rabbitmq"),
    ("queue", Substring, "rabbitmq"),
    ("kafka", Substring, "kafka"),
    ("prometheus", Substring, "prometheus"),
    ("metrics", Substring, "prometheus"),
    ("grafana", Substring, "grafana"),
    ("dashboard", Substring, "grafana"),
    ("mailhog", Substring, "mailhog"),
    ("mail", Substring, "mailhog"),
    ("smtp", Substring, "mailhog"),
    ("storybook", Substring, "devtools"),
    ("devtools", Substring, "devtools"),
    ("debug", Substring, "devtools"),
    ("nginx", Substring, "proxy"),
    ("proxy", Substring, "proxy"),
    ("frontend", Substring, "frontend"),
    ("client", Substring, "frontend"),
    ("react", Substring, "frontend"),
    ("vue", Token, "frontend"),
    ("next", Token, "frontend"),
    ("angular", Substring, "frontend"),
    ("vite", Token, "frontend"),
    ("web", Token, "frontend"),
    ("ui", Token, "frontend"),
    ("app", Token, "frontend"),
    ("backend", Substring, "backend"),
    ("server", Substring, "backend"),
    ("api", Token, "backend"),
    ("service", Token, "backend"),
    ("database", Substring, "postgres"),
    ("db", Token, "postgres"),
];

/// Returns the service type name a keyword in `service_name` points at.
///
/// Exact type-name matches are handled by the registry before this runs.
///
/// # Examples
///
/// ```
/// use berth::registry::classify::keyword_type;
///
/// assert_eq!(keyword_type("mongo-primary"), Some("mongodb"));
/// assert_eq!(keyword_type("user-api"), Some("backend"));
/// assert_eq!(keyword_type("cache-db"), Some("redis"));
/// assert_eq!(keyword_type("thing"), None);
/// ```
#[must_use]
pub fn keyword_type(service_name: &str) -> Option<&'static str> {
    let name = service_name.to_ascii_lowercase();
    let tokens: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    KEYWORDS
        .iter()
        .find(|(keyword, kind, _)| match kind {
            Substring => name.contains(keyword),
            Token => tokens.contains(keyword),
        })
        .map(|(_, _, ty)| *ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_names() {
        let cases = [
            ("frontend", "frontend"),
            ("web", "frontend"),
            ("admin-ui", "frontend"),
            ("react-app", "frontend"),
            ("api", "backend"),
            ("api-server", "backend"),
            ("users-service", "backend"),
            ("mongodb", "mongodb"),
            ("redis-cache", "redis"),
            ("pg-database", "postgres"),
            ("api-gateway", "gateway"),
            ("websocket-server", "websocket"),
            ("email-worker", "worker"),
            ("kafka-broker", "kafka"),
        ];
        for (name, expected) in cases {
            assert_eq!(keyword_type(name), Some(expected), "classifying {name}");
        }
    }

    #[test]
    fn test_table_order_breaks_ties() {
        // matches both `cache` and `db`; `cache` is listed first
        assert_eq!(keyword_type("cache-db"), Some("redis"));
        // matches both `worker` and `queue`
        assert_eq!(keyword_type("queue-worker"), Some("worker"));
    }

    #[test]
    fn test_short_keywords_need_whole_tokens() {
        assert_eq!(keyword_type("build"), None);
        assert_eq!(keyword_type("rapid"), None);
        assert_eq!(keyword_type("my_ui"), Some("frontend"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(keyword_type("MongoReplica"), Some("mongodb"));
    }
}
