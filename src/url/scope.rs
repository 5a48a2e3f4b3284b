use crate::url::NormalizedUrl;
use serde::{Deserialize, Serialize};

/// Which hosts count as part of the site being mapped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopePolicy {
    /// Only the exact host of the site root
    #[default]
    SameHost,

    /// The host of the site root and any of its subdomains
    IncludeSubdomains,
}

/// Checks whether `url` belongs to the site rooted at `site_root`
///
/// Uses the default policy: the hosts must be equal. Scheme and port are not
/// compared, so `http://` and `https://` pages of one host are the same site.
///
/// # Examples
///
/// ```
/// use site_mapper::url::{in_scope, normalize};
///
/// let root = normalize("http://example.test/", None).unwrap();
/// assert!(in_scope(&normalize("https://example.test/a", None).unwrap(), &root));
/// assert!(!in_scope(&normalize("http://blog.example.test/", None).unwrap(), &root));
/// ```
pub fn in_scope(url: &NormalizedUrl, site_root: &NormalizedUrl) -> bool {
    in_scope_with(url, site_root, ScopePolicy::SameHost)
}

/// Checks whether `url` belongs to the site under an explicit policy
pub fn in_scope_with(url: &NormalizedUrl, site_root: &NormalizedUrl, policy: ScopePolicy) -> bool {
    let candidate = url.host();
    let root = site_root.host();

    if candidate.is_empty() || root.is_empty() {
        return false;
    }

    match policy {
        ScopePolicy::SameHost => candidate == root,
        ScopePolicy::IncludeSubdomains => is_same_or_subdomain(root, candidate),
    }
}

/// `candidate` is `base` itself or ends with `.base`
fn is_same_or_subdomain(base: &str, candidate: &str) -> bool {
    candidate == base || candidate.ends_with(&format!(".{}", base))
}
