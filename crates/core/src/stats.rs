// crates/core/src/stats.rs
//! URL corpus statistics.
//!
//! A pure summary over a job's full URL list: counts by file extension,
//! subdomain, path depth, transport and query-parameter presence. The
//! computation is order-independent — permuting the input yields identical
//! output — and never touches the stored result.

use std::collections::BTreeMap;

use serde::Serialize;

/// Extension and subdomain maps keep only this many entries.
const TOP_ENTRIES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolCounts {
    pub http: usize,
    pub https: usize,
}

/// Summary statistics over a URL corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlStats {
    pub total: usize,
    pub by_extension: BTreeMap<String, usize>,
    pub by_subdomain: BTreeMap<String, usize>,
    pub by_path_depth: BTreeMap<usize, usize>,
    pub protocols: ProtocolCounts,
    pub with_params: usize,
}

/// Compute summary statistics for a list of URLs.
pub fn analyze_urls<S: AsRef<str>>(urls: &[S]) -> UrlStats {
    let mut stats = UrlStats {
        total: urls.len(),
        ..Default::default()
    };

    for url in urls {
        let Some(parts) = split_url(url.as_ref()) else {
            continue;
        };

        match parts.scheme {
            "http" => stats.protocols.http += 1,
            "https" => stats.protocols.https += 1,
            _ => {}
        }

        if !parts.host.is_empty() {
            *stats.by_subdomain.entry(parts.host.to_string()).or_insert(0) += 1;
        }

        if let Some(ext) = extension_of(parts.path) {
            *stats.by_extension.entry(ext).or_insert(0) += 1;
        }

        let depth = parts.path.split('/').filter(|s| !s.is_empty()).count();
        *stats.by_path_depth.entry(depth).or_insert(0) += 1;

        if parts.query.is_some_and(|q| !q.is_empty()) {
            stats.with_params += 1;
        }
    }

    stats.by_extension = keep_top(stats.by_extension, TOP_ENTRIES);
    stats.by_subdomain = keep_top(stats.by_subdomain, TOP_ENTRIES);
    stats
}

struct UrlParts<'a> {
    scheme: &'a str,
    host: &'a str,
    path: &'a str,
    query: Option<&'a str>,
}

/// Minimal URL split: scheme://host/path?query#fragment. Enough for corpus
/// bucketing; anything unparsable is skipped by the caller.
fn split_url(url: &str) -> Option<UrlParts<'_>> {
    let (scheme, rest) = url.split_once("://")?;
    let rest = rest.split('#').next().unwrap_or(rest);
    let (before_query, query) = match rest.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (rest, None),
    };
    let (host, path) = match before_query.find('/') {
        Some(i) => (&before_query[..i], &before_query[i..]),
        None => (before_query, ""),
    };
    Some(UrlParts {
        scheme,
        host,
        path,
        query,
    })
}

/// File extension of the last path segment, lowercased, at most 5 chars.
fn extension_of(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Keep the `n` highest-count entries. Ties break on key so the result is
/// invariant under input permutation.
fn keep_top(map: BTreeMap<String, usize>, n: usize) -> BTreeMap<String, usize> {
    if map.len() <= n {
        return map;
    }
    let mut entries: Vec<(String, usize)> = map.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries.into_iter().collect()
}
