use crate::{UrlError, UrlResult};
use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// Document names treated as the directory index when `strip_index` is on
const INDEX_DOCUMENTS: &[&str] = &[
    "index.html",
    "index.htm",
    "index.php",
    "default.htm",
    "default.html",
    "default.aspx",
];

/// Optional normalization rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Strip a trailing index document name (`/docs/index.html` -> `/docs/`)
    pub strip_index: bool,
}

/// A canonical http(s) URL used as the unique key of a page
///
/// Two links that point at the same resource in the ways this crate
/// recognises compare equal once normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    /// Returns the canonical string form
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying parsed URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host; normalized URLs always have one
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Normalizes a raw link with the default rules
///
/// See [`normalize_with`] for the full list of steps.
///
/// # Examples
///
/// ```
/// use site_mapper::url::normalize;
/// use url::Url;
///
/// let base = Url::parse("http://Example.TEST:80/docs/").unwrap();
/// let url = normalize("../about#team", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "http://example.test/about");
///
/// assert!(normalize("mailto:someone@example.test", Some(&base)).is_err());
/// ```
pub fn normalize(raw: &str, base: Option<&Url>) -> UrlResult<NormalizedUrl> {
    normalize_with(raw, base, NormalizeOptions::default())
}

/// Normalizes a raw link string into a [`NormalizedUrl`]
///
/// # Normalization Steps
///
/// 1. Reject empty input
/// 2. Resolve against `base` when given, otherwise parse as absolute
/// 3. Reject anything that is not http or https (`mailto:`, `javascript:`, ...)
/// 4. Reject URLs without a host
/// 5. Lowercase scheme and host, drop default ports, remove dot segments
///    (performed by the `url` parser)
/// 6. Remove the fragment and an empty query string
/// 7. Decode percent-escapes of unreserved characters and uppercase the hex
///    digits of the escapes that remain
/// 8. Optionally strip a trailing index document name
///
/// The query string is otherwise kept as-is and duplicate slashes in the
/// path are left alone.
///
/// # Arguments
///
/// * `raw` - The link as found in the document
/// * `base` - The URL to resolve relative references against
/// * `options` - Optional rules
///
/// # Returns
///
/// * `Ok(NormalizedUrl)` - The canonical URL
/// * `Err(UrlError)` - The link was rejected
pub fn normalize_with(
    raw: &str,
    base: Option<&Url>,
    options: NormalizeOptions,
) -> UrlResult<NormalizedUrl> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    };
    let mut url = parsed.map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    if url.query() == Some("") {
        url.set_query(None);
    }

    let mut path = normalize_percent_encoding(url.path());
    if options.strip_index {
        path = strip_index_document(&path);
    }
    url.set_path(&path);

    Ok(NormalizedUrl(url))
}

/// Decodes escapes of unreserved characters and uppercases the rest
///
/// The input is a serialized URL path, which is always ASCII.
fn normalize_percent_encoding(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = high * 16 + low;
                if is_unreserved(decoded) {
                    out.push(decoded as char);
                } else {
                    out.push('%');
                    out.push(bytes[i + 1].to_ascii_uppercase() as char);
                    out.push(bytes[i + 2].to_ascii_uppercase() as char);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }

    out
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Removes a trailing index document name, keeping the directory slash
fn strip_index_document(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => {
            let last = &path[pos + 1..];
            if INDEX_DOCUMENTS
                .iter()
                .any(|name| name.eq_ignore_ascii_case(last))
            {
                path[..=pos].to_string()
            } else {
                path.to_string()
            }
        }
        None => path.to_string(),
    }
}
