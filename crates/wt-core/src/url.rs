//! URL eligibility and domain extraction.

/// Scheme prefixes that mark a URL as browser-internal and untrackable.
const INELIGIBLE_SCHEMES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "about:",
    "file://",
    "edge://",
    "moz-extension://",
];

/// Returns true when `url` points at a trackable web page.
///
/// Empty input and browser-internal schemes (settings pages, extension pages,
/// `about:` pseudo-pages, local files) are ineligible. Anything else —
/// http/https and other externally-navigable schemes — is tracked. Never
/// panics, whatever the input.
#[must_use]
pub fn is_eligible(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    !INELIGIBLE_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
}

/// Derives the tracking key for a URL: the eTLD+1 of its hostname.
///
/// The hostname is lowercased, `www` labels are dropped, and the last two
/// dot-separated labels are kept (`mail.google.com` → `google.com`). Hostnames
/// with fewer than two labels (`localhost`) pass through whole. When the input
/// cannot be parsed as a URL it is returned unchanged so downstream code
/// always has a non-empty key.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    let Some(host) = hostname(url) else {
        return url.to_string();
    };
    let host = host.to_ascii_lowercase();
    let parts: Vec<&str> = host.split('.').filter(|part| *part != "www").collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2..].join(".")
    } else {
        host
    }
}

/// Extracts the host from a URL string, or `None` when it has no authority.
fn hostname(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    // Drop userinfo if present.
    let host_port = match authority.rsplit_once('@') {
        Some((_, host)) => host,
        None => authority,
    };
    // Bracketed IPv6 literals keep their colons; otherwise strip the port.
    let host = if let Some(inner) = host_port.strip_prefix('[') {
        match inner.find(']') {
            Some(i) => &inner[..i],
            None => inner,
        }
    } else {
        match host_port.find(':') {
            Some(i) => &host_port[..i],
            None => host_port,
        }
    };
    if host.is_empty() { None } else { Some(host) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_internal_schemes() {
        assert!(!is_eligible("chrome://settings"));
        assert!(!is_eligible("chrome-extension://abcdef/popup.html"));
        assert!(!is_eligible("about:blank"));
        assert!(!is_eligible("file:///home/user/notes.txt"));
        assert!(!is_eligible("edge://flags"));
        assert!(!is_eligible("moz-extension://abcdef/"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!is_eligible(""));
    }

    #[test]
    fn accepts_web_urls() {
        assert!(is_eligible("https://youtube.com/watch?v=abc"));
        assert!(is_eligible("http://example.org"));
        assert!(is_eligible("ftp://mirror.example.org/pub"));
    }

    #[test]
    fn collapses_to_etld_plus_one() {
        assert_eq!(extract_domain("https://mail.google.com"), "google.com");
        assert_eq!(extract_domain("https://youtube.com/watch?v=abc"), "youtube.com");
        assert_eq!(extract_domain("https://a.b.c.example.com/path#frag"), "example.com");
    }

    #[test]
    fn strips_www() {
        assert_eq!(extract_domain("https://www.example.com"), "example.com");
        assert_eq!(extract_domain("http://www.example.com:8080/x"), "example.com");
    }

    #[test]
    fn single_label_hosts_pass_through() {
        assert_eq!(extract_domain("http://localhost:3000/app"), "localhost");
    }

    #[test]
    fn lowercases_hostname() {
        assert_eq!(extract_domain("https://Mail.GOOGLE.com"), "google.com");
    }

    #[test]
    fn unparseable_input_falls_back() {
        assert_eq!(extract_domain("not-a-valid-url"), "not-a-valid-url");
        assert_eq!(extract_domain(""), "");
        assert_eq!(extract_domain("https://"), "https://");
    }

    #[test]
    fn handles_userinfo_and_port() {
        assert_eq!(extract_domain("https://user:pw@sub.example.com:443/"), "example.com");
    }

    #[test]
    fn handles_ipv6_literal() {
        assert_eq!(extract_domain("http://[::1]:8080/"), "::1");
    }
}
