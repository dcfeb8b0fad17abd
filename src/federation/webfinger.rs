//! WebFinger protocol implementation
//!
//! Used by remote servers to discover the actor URI behind an address.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Account address extracted from a webfinger `resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAddress {
    pub username: String,
    pub domain: String,
}

/// Parse a webfinger `resource` parameter
///
/// Accepted forms:
/// - `acct:user@domain`
/// - `user@domain` and `@user@domain`
/// - `https://domain/users/user` (or `http://`)
///
/// The domain is lowercased; the username is returned as given.
pub fn parse_resource(resource: &str) -> Option<ResourceAddress> {
    let resource = resource.trim();

    if resource.starts_with("https://") || resource.starts_with("http://") {
        return parse_actor_url(resource);
    }

    let address = resource.strip_prefix("acct:").unwrap_or(resource);
    let address = address.strip_prefix('@').unwrap_or(address);
    let (username, domain) = address.split_once('@')?;

    if !is_username(username) || domain.is_empty() || domain.contains(['@', '/', ' ']) {
        return None;
    }

    Some(ResourceAddress {
        username: username.to_string(),
        domain: domain.to_lowercase(),
    })
}

fn parse_actor_url(resource: &str) -> Option<ResourceAddress> {
    let url = url::Url::parse(resource).ok()?;
    let host = url.host_str()?;
    let domain = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut segments = url.path_segments()?.filter(|segment| !segment.is_empty());
    let (Some("users"), Some(username), None) = (segments.next(), segments.next(), segments.next())
    else {
        return None;
    };

    if !is_username(username) {
        return None;
    }

    Some(ResourceAddress {
        username: username.to_string(),
        domain: domain.to_lowercase(),
    })
}

fn is_username(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Cache key of a webfinger response
///
/// Hashes the raw resource string, so differently spelled resources for the
/// same account are cached separately.
pub fn cache_key(resource: &str) -> String {
    format!(
        "federation:webfinger:sha256:{:x}",
        Sha256::digest(resource.as_bytes())
    )
}

/// WebFinger JRD response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WebFingerResponse {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    pub links: Vec<WebFingerLink>,
}

/// WebFinger link
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WebFingerLink {
    pub rel: String,
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Generate WebFinger response for a local account.
///
/// # Arguments
/// * `username` - Local username, as stored
/// * `domain` - Instance domain
/// * `base_url` - Instance base URL (includes protocol)
pub fn generate_webfinger_response(username: &str, domain: &str, base_url: &str) -> WebFingerResponse {
    let base_url = base_url.trim_end_matches('/');
    let actor_url = format!("{}/users/{}", base_url, username);
    let profile_url = format!("{}/@{}", base_url, username);

    WebFingerResponse {
        subject: format!("acct:{}@{}", username, domain),
        aliases: Some(vec![profile_url.clone(), actor_url.clone()]),
        links: vec![
            WebFingerLink {
                rel: "http://webfinger.net/rel/profile-page".to_string(),
                link_type: Some("text/html".to_string()),
                href: Some(profile_url),
                template: None,
            },
            WebFingerLink {
                rel: "self".to_string(),
                link_type: Some("application/activity+json".to_string()),
                href: Some(actor_url),
                template: None,
            },
        ],
    }
}

/// XRD document pointing `lrdd` lookups at the webfinger endpoint
pub fn host_meta_document(base_url: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<XRD xmlns="http://docs.oasis-open.org/ns/xri/xrd-1.0">"#,
            r#"<Link rel="lrdd" type="application/xrd+xml" template="{}/.well-known/webfinger?resource={{uri}}"/>"#,
            r#"</XRD>"#
        ),
        base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(username: &str, domain: &str) -> Option<ResourceAddress> {
        Some(ResourceAddress {
            username: username.to_string(),
            domain: domain.to_string(),
        })
    }

    #[test]
    fn parses_account_forms() {
        let expected = address("alice", "social.example");
        assert_eq!(parse_resource("acct:alice@social.example"), expected);
        assert_eq!(parse_resource("alice@social.example"), expected);
        assert_eq!(parse_resource("@alice@social.example"), expected);
        assert_eq!(parse_resource("acct:alice@Social.Example"), expected);
    }

    #[test]
    fn parses_actor_urls() {
        assert_eq!(
            parse_resource("https://social.example/users/alice"),
            address("alice", "social.example")
        );
        assert_eq!(
            parse_resource("http://localhost:8080/users/bob/"),
            address("bob", "localhost:8080")
        );
    }

    #[test]
    fn rejects_malformed_resources() {
        for resource in [
            "",
            "acct:",
            "alice",
            "acct:@social.example",
            "acct:alice@",
            "acct:alice@social.example@evil.example",
            "acct:al ice@social.example",
            "https://social.example/@alice",
            "https://social.example/users/alice/outbox",
            "https://social.example/users/",
            "mailto:alice@social.example",
        ] {
            assert_eq!(parse_resource(resource), None, "{resource:?} should not parse");
        }
    }

    #[test]
    fn cache_key_is_sensitive_to_raw_resource() {
        assert_eq!(
            cache_key("acct:alice@social.example"),
            cache_key("acct:alice@social.example")
        );
        assert_ne!(
            cache_key("acct:alice@social.example"),
            cache_key("acct:Alice@social.example")
        );
        assert_ne!(
            cache_key("acct:alice@social.example"),
            cache_key("alice@social.example")
        );
        assert_ne!(
            cache_key("acct:alice@social.example"),
            cache_key("acct:alice@social.example ")
        );
        assert!(cache_key("x").starts_with("federation:webfinger:sha256:"));
        assert_eq!(cache_key("x").len(), "federation:webfinger:sha256:".len() + 64);
    }

    #[test]
    fn test_generate_webfinger_response_includes_self_link() {
        let response =
            generate_webfinger_response("alice", "social.example", "https://social.example/");

        assert_eq!(response.subject, "acct:alice@social.example");
        assert_eq!(
            response.aliases,
            Some(vec![
                "https://social.example/@alice".to_string(),
                "https://social.example/users/alice".to_string(),
            ])
        );

        let self_link = response
            .links
            .iter()
            .find(|link| link.rel == "self")
            .expect("self link should exist");
        assert_eq!(
            self_link.link_type.as_deref(),
            Some("application/activity+json")
        );
        assert_eq!(
            self_link.href.as_deref(),
            Some("https://social.example/users/alice")
        );
    }

    #[test]
    fn host_meta_points_at_webfinger() {
        let xml = host_meta_document("https://social.example");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(
            r#"template="https://social.example/.well-known/webfinger?resource={uri}""#
        ));
    }
}
