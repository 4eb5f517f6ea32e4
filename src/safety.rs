use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::warn;
use url::{Host, Url};

const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

/// Decides whether a URL may be loaded at all. Consulted before any network access.
pub trait UrlGate: Send + Sync {
    fn is_safe(&self, url: &str) -> bool;
}

/// Rejects anything that is not public http(s): loopback, private ranges,
/// link-local, unspecified addresses and `localhost` names.
#[derive(Debug, Default, Clone, Copy)]
pub struct SsrfGuard;

impl UrlGate for SsrfGuard {
    fn is_safe(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }

        let safe = match parsed.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                domain != "localhost" && !domain.ends_with(".localhost")
            }
            Some(Host::Ipv4(ip)) => is_public_v4(ip),
            Some(Host::Ipv6(ip)) => is_public_v6(ip),
            None => false,
        };

        if !safe {
            warn!(url, "Blocked non-public URL");
        }
        safe
    }
}

/// Lets everything through; for tests against local mock servers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl UrlGate for AllowAll {
    fn is_safe(&self, _url: &str) -> bool {
        true
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64))
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_public_v4(mapped);
    }
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80)
}

/// Drops the fragment and `utm_*` tracking parameters. Unparseable input is returned as is.
pub fn sanitize_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else if parsed.query_pairs().count() != kept.len() {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    parsed.to_string()
}
