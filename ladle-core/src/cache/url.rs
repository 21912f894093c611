//! Source URL canonicalization for cache keying.

use url::Url;

use crate::error::ImportError;

/// Query parameters that never change page content; stripped so URL
/// variants from share sheets key to the same cache entry.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "igshid"];

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Canonicalize a source URL into the cache key.
///
/// Lower-cases scheme and host (defaulting the scheme to https), strips
/// the trailing slash from the path (root stays "/"), drops the
/// fragment and all tracking parameters, and keeps the remaining query
/// parameters in their original order. Idempotent:
/// `normalize_url(normalize_url(u)) == normalize_url(u)`.
pub fn normalize_url(raw: &str) -> Result<String, ImportError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ImportError::InvalidUrl(raw.to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url =
        Url::parse(&with_scheme).map_err(|e| ImportError::InvalidUrl(e.to_string()))?;
    if !url.has_host() {
        return Err(ImportError::InvalidUrl(raw.to_string()));
    }

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| {
                let k = form_encode(k);
                if v.is_empty() {
                    format!("{}=", k)
                } else {
                    format!("{}={}", k, form_encode(v))
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path.trim_end_matches('/').to_string();
        url.set_path(&stripped);
    }

    Ok(url.to_string())
}

fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_and_lowercases_host() {
        let normalized = normalize_url("https://EX.com/r/?utm_source=x&id=5").unwrap();
        assert_eq!(normalized, "https://ex.com/r?id=5");
    }

    #[test]
    fn normalization_is_idempotent() {
        let urls = [
            "HTTP://Example.COM/Recipes/Cake/?utm_campaign=a&fbclid=b#step-3",
            "example.com/pasta?gclid=1&servings=4",
            "https://example.com/",
        ];
        for raw in urls {
            let once = normalize_url(raw).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn defaults_scheme_to_https() {
        assert_eq!(
            normalize_url("example.com/brot").unwrap(),
            "https://example.com/brot"
        );
    }

    #[test]
    fn root_path_stays_slash() {
        assert_eq!(
            normalize_url("https://example.com/").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn keeps_blank_values_and_order() {
        assert_eq!(
            normalize_url("https://ex.com/r?b=&a=1&UTM_medium=social").unwrap(),
            "https://ex.com/r?b=&a=1"
        );
    }

    #[test]
    fn drops_fragment() {
        assert_eq!(
            normalize_url("https://ex.com/r#comments").unwrap(),
            "https://ex.com/r"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(normalize_url("").is_err());
        assert!(normalize_url("https://").is_err());
    }
}
