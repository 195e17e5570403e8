//! URL scheme/host validation performed before any network IO (spec §4.1).

use std::net::IpAddr;
use url::Url;

/// Result of validating a URL before fetch (shape grounded on the example
/// pack's `SsrfCheckResult`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlCheck {
    Allowed,
    Blocked(BlockReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    InvalidScheme,
    Localhost,
    PrivateIpv4,
    PrivateIpv6,
    NoHost,
    Unparseable,
}

/// Validate an absolute URL per spec §4.1: only `http`/`https`, no
/// `localhost`, no literal private/loopback/link-local address.
pub fn check_url(raw: &str) -> UrlCheck {
    let Ok(url) = Url::parse(raw) else {
        return UrlCheck::Blocked(BlockReason::Unparseable);
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return UrlCheck::Blocked(BlockReason::InvalidScheme);
    }

    let Some(host) = url.host_str() else {
        return UrlCheck::Blocked(BlockReason::NoHost);
    };

    if host.eq_ignore_ascii_case("localhost") {
        return UrlCheck::Blocked(BlockReason::Localhost);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        match ip {
            IpAddr::V4(v4) => {
                if is_private_or_loopback_v4(v4) {
                    return UrlCheck::Blocked(BlockReason::PrivateIpv4);
                }
            }
            IpAddr::V6(v6) => {
                if is_private_or_loopback_v6(v6) {
                    return UrlCheck::Blocked(BlockReason::PrivateIpv6);
                }
            }
        }
    }

    UrlCheck::Allowed
}

fn is_private_or_loopback_v4(ip: std::net::Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback() // 127/8
        || octets[0] == 10 // 10/8
        || (octets[0] == 172 && (16..=31).contains(&octets[1])) // 172.16/12
        || (octets[0] == 192 && octets[1] == 168) // 192.168/16
        || (octets[0] == 169 && octets[1] == 254) // 169.254/16 link-local
}

fn is_private_or_loopback_v6(ip: std::net::Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true; // ::1
    }
    let segments = ip.segments();
    // fc00::/7
    if (segments[0] & 0xfe00) == 0xfc00 {
        return true;
    }
    // fe80::/10 link-local
    if (segments[0] & 0xffc0) == 0xfe80 {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_localhost() {
        assert_eq!(
            check_url("http://localhost/"),
            UrlCheck::Blocked(BlockReason::Localhost)
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert_eq!(
            check_url("file:///etc/passwd"),
            UrlCheck::Blocked(BlockReason::InvalidScheme)
        );
        assert_eq!(
            check_url("javascript:alert(1)"),
            UrlCheck::Blocked(BlockReason::InvalidScheme)
        );
    }

    #[test]
    fn rejects_private_ipv4_ranges() {
        for host in ["10.0.0.1", "172.16.0.1", "192.168.1.1", "127.0.0.1", "169.254.1.1"] {
            let url = format!("http://{host}/");
            assert!(matches!(check_url(&url), UrlCheck::Blocked(_)), "{host} should be blocked");
        }
    }

    #[test]
    fn rejects_private_ipv6_ranges() {
        for host in ["[::1]", "[fc00::1]", "[fe80::1]"] {
            let url = format!("http://{host}/");
            assert!(matches!(check_url(&url), UrlCheck::Blocked(_)), "{host} should be blocked");
        }
    }

    #[test]
    fn allows_public_https() {
        assert_eq!(check_url("https://example.com/a"), UrlCheck::Allowed);
    }
}
