//! Page URL to domain resolution.
//!
//! The notification queue keys prompts by the registrable domain of the page
//! ("accounts.example.com" and "www.example.com" both map to "example.com").

use url::{Host, Url};

/// Second-level labels that form multi-part public suffixes under a ccTLD.
const MULTI_PART_SUFFIX_LABELS: &[&str] = &["co", "com", "net", "org", "gov", "ac", "edu", "ne", "or"];

/// Resolve the registrable domain of a page URL.
///
/// IP hosts and single-label hosts such as `localhost` are returned unchanged.
/// Returns `None` for unparseable URLs, `data:` URIs, and URLs without a host.
pub fn get_domain(raw: &str) -> Option<String> {
    let url = parse_web_url(raw)?;
    match url.host()? {
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
        Host::Domain(host) => registrable_domain(host),
    }
}

/// Resolve the full hostname of a page URL.
pub fn get_hostname(raw: &str) -> Option<String> {
    let url = parse_web_url(raw)?;
    url.host_str().map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
}

fn parse_web_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }

    let url = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("http://{raw}")).ok()?
    };
    url.has_host().then_some(url)
}

fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|label| label.is_empty()) {
        return None;
    }
    if labels.len() <= 2 {
        return Some(host.to_string());
    }

    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && MULTI_PART_SUFFIX_LABELS.contains(&second) {
        3
    } else {
        2
    };
    Some(labels[labels.len() - keep..].join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomains_collapse_to_registrable_domain() {
        assert_eq!(
            get_domain("https://accounts.example.com/login").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            get_domain("https://www.example.com").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn multi_part_suffixes_keep_three_labels() {
        assert_eq!(
            get_domain("https://login.bank.co.uk/").as_deref(),
            Some("bank.co.uk")
        );
        assert_eq!(get_domain("https://shop.example.de").as_deref(), Some("example.de"));
    }

    #[test]
    fn ip_and_single_label_hosts_are_kept() {
        assert_eq!(
            get_domain("http://192.168.1.10:8080/admin").as_deref(),
            Some("192.168.1.10")
        );
        assert_eq!(get_domain("http://localhost:3000").as_deref(), Some("localhost"));
    }

    #[test]
    fn scheme_less_urls_are_accepted() {
        assert_eq!(get_domain("mail.example.org/inbox").as_deref(), Some("example.org"));
    }

    #[test]
    fn unresolvable_urls_return_none() {
        assert_eq!(get_domain(""), None);
        assert_eq!(get_domain("data:text/html,hello"), None);
        assert_eq!(get_domain("about:blank"), None);
        assert_eq!(get_domain("http://"), None);
    }

    #[test]
    fn hostname_keeps_subdomain() {
        assert_eq!(
            get_hostname("https://www.example.com/path?q=1").as_deref(),
            Some("www.example.com")
        );
        assert_eq!(get_hostname("about:blank"), None);
    }
}
