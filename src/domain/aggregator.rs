//! Host classification and URL cleanup shared by every resolution strategy.

use url::Url;

/// Query parameters added by referrers and analytics, never part of the article address.
const TRACKING_PARAMS: &[&str] = &[
    "oc",
    "ocid",
    "fbclid",
    "gclid",
    "dclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "guccounter",
    "guce_referrer",
    "guce_referrer_sig",
    "cmpid",
    "_ga",
];

const TRACKING_PREFIXES: &[&str] = &["utm_"];

const AMP_CACHE_SUFFIX: &str = ".cdn.ampproject.org";

/// Second-level labels used under country TLDs, as in `google.co.uk` or `google.com.au`.
const COUNTRY_SECOND_LEVEL: &[&str] = &[
    "co", "com", "ac", "ad", "ne", "or", "org", "gov", "net", "edu",
];

/// Subdomains of the aggregator's domains that publish their own articles.
const PUBLISHER_SUBDOMAINS: &[&str] = &["cloud", "developers", "research", "blog"];

fn is_country_code(label: &str) -> bool {
    label.len() == 2 && label.bytes().all(|b| b.is_ascii_lowercase())
}

fn is_top_level(label: &str) -> bool {
    label.len() >= 2 && label.bytes().all(|b| b.is_ascii_lowercase())
}

/// True for the aggregator's own domain family, e.g. `news.google.com`,
/// `consent.google.com` or `www.google.co.uk`.
///
/// Only `google.<tld>` and `google.<sld>.<cc>` and their subdomains match, so
/// `google.github.io`, `*.google.blogspot.com`, `blog.google` and
/// `googleblog.com` are publishers. So are publishing subdomains such as
/// `cloud.google.com`.
pub fn is_aggregator_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();

    let Some(pos) = labels.iter().rposition(|label| *label == "google") else {
        return false;
    };

    let registered = match &labels[pos + 1..] {
        [tld] => is_top_level(tld),
        [sld, cc] => COUNTRY_SECOND_LEVEL.contains(sld) && is_country_code(cc),
        _ => false,
    };
    let publisher = pos > 0 && PUBLISHER_SUBDOMAINS.contains(&labels[pos - 1]);

    registered && !publisher
}

/// True for aggregator-hosted or AMP-cache mirrors of a publisher page.
pub fn is_amp_mirror(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    host.ends_with(AMP_CACHE_SUFFIX)
        || (is_aggregator_host(host) && parsed.path().starts_with("/amp/"))
}

/// An absolute http(s) URL whose host is outside the aggregator's domains.
pub fn is_off_aggregator(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed
                    .host_str()
                    .map(|host| !is_aggregator_host(host))
                    .unwrap_or(false)
        }
        Err(_) => false,
    }
}

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&name.as_str())
        || TRACKING_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Remove known tracking query parameters. Unparseable input is returned unchanged.
pub fn strip_tracking(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    if parsed.query().is_none() {
        return parsed.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    parsed.to_string()
}
