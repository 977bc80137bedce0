//! Conditional-GET response cache: ETag generation, `If-None-Match`
//! negotiation, TTL expiry and coarse invalidation (spec §4.7).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

const CACHEABLE_CONTENT_TYPES: &[&str] = &[
    "application/dicom+json",
    "application/json",
    "multipart/related",
    "application/dicom",
    "application/octet-stream",
];

/// Returns true when `content_type` (its media type, ignoring parameters)
/// is in the cacheable allow-list.
pub fn is_cacheable_content_type(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    CACHEABLE_CONTENT_TYPES.contains(&media_type)
}

/// Computes the weak ETag fingerprint recommended by the Design Notes: a
/// stable 128-bit hash of `length || head(64) || tail(64)`, bounding cost
/// for large bodies while remaining sensitive to content changes.
pub fn compute_etag(body: &[u8]) -> String {
    let mut buf = Vec::with_capacity(8 + 128);
    buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
    let head_len = body.len().min(64);
    buf.extend_from_slice(&body[..head_len]);
    let tail_start = body.len().saturating_sub(64);
    buf.extend_from_slice(&body[tail_start..]);

    let forward = seahash::hash(&buf);
    let reversed: Vec<u8> = buf.iter().rev().copied().collect();
    let backward = seahash::hash(&reversed);
    format!("W/\"{forward:016x}{backward:016x}\"")
}

/// Builds the canonical cache key `path | sorted(query k=v) | Accept`.
pub fn canonical_key(path: &str, query: &[(String, String)], accept: &str) -> String {
    let mut pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    format!("{path}|{}|{accept}", pairs.join("&"))
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub body: Vec<u8>,
    pub content_type: String,
    pub etag: String,
    pub stored_at: Instant,
    pub expires_at: Instant,
    pub preserved_headers: Vec<(String, String)>,
}

pub enum CacheLookup {
    Hit(CacheEntry),
    NotModified { etag: String },
    Miss,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl_seconds: u64,
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: 60,
            max_entries: 1000,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// A size- and count-bounded in-memory response cache (spec §4.7).
pub struct ResponseCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up `key`, honouring `If-None-Match` (a literal `*` or a value
    /// equal to the stored ETag both yield `NotModified`). Expired entries
    /// are evicted and treated as a miss.
    pub async fn get(&self, key: &str, if_none_match: Option<&str>) -> CacheLookup {
        if !self.config.enabled {
            return CacheLookup::Miss;
        }

        let expired = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) => entry.expires_at <= Instant::now(),
                None => return CacheLookup::Miss,
            }
        };
        if expired {
            self.entries.write().await.remove(key);
            return CacheLookup::Miss;
        }

        let entries = self.entries.read().await;
        let entry = entries.get(key).expect("checked above");
        if let Some(header) = if_none_match {
            if header == "*" || header_matches_etag(header, &entry.etag) {
                return CacheLookup::NotModified {
                    etag: entry.etag.clone(),
                };
            }
        }
        CacheLookup::Hit(entry.clone())
    }

    /// Stores a response, computing its ETag and expiry. Entries are
    /// evicted oldest-first when `max_entries`/`max_bytes` would be
    /// exceeded.
    pub async fn put(
        &self,
        key: String,
        body: Vec<u8>,
        content_type: String,
        preserved_headers: Vec<(String, String)>,
    ) -> CacheEntry {
        let etag = compute_etag(&body);
        let now = Instant::now();
        let entry = CacheEntry {
            body,
            content_type,
            etag,
            stored_at: now,
            expires_at: now + Duration::from_secs(self.config.default_ttl_seconds),
            preserved_headers,
        };

        if !self.config.enabled {
            return entry;
        }

        let mut entries = self.entries.write().await;
        entries.insert(key, entry.clone());
        enforce_bounds(&mut entries, self.config.max_entries, self.config.max_bytes);
        entry
    }

    /// Coarse invalidation: clears every entry. Invoked on any STOW-RS or
    /// delete request (spec §3 Lifecycles).
    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn header_matches_etag(header: &str, etag: &str) -> bool {
    header.split(',').any(|candidate| candidate.trim() == etag)
}

fn enforce_bounds(entries: &mut HashMap<String, CacheEntry>, max_entries: usize, max_bytes: usize) {
    loop {
        let total_bytes: usize = entries.values().map(|e| e.body.len()).sum();
        if entries.len() <= max_entries && total_bytes <= max_bytes {
            break;
        }
        let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(k, _)| k.clone())
        else {
            break;
        };
        entries.remove(&oldest_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_gets_hit_with_same_body() {
        let cache = ResponseCache::new(CacheConfig::default());
        let key = canonical_key("/studies/1.2.3/metadata", &[], "application/dicom+json");
        let stored = cache
            .put(
                key.clone(),
                b"[]".to_vec(),
                "application/dicom+json".to_string(),
                vec![],
            )
            .await;

        match cache.get(&key, None).await {
            CacheLookup::Hit(entry) => {
                assert_eq!(entry.body, stored.body);
                assert_eq!(entry.etag, stored.etag);
            }
            _ => panic!("expected hit"),
        }
    }

    #[tokio::test]
    async fn if_none_match_yields_not_modified() {
        let cache = ResponseCache::new(CacheConfig::default());
        let key = canonical_key("/studies/1.2.3/metadata", &[], "application/dicom+json");
        let stored = cache
            .put(key.clone(), b"[]".to_vec(), "application/dicom+json".to_string(), vec![])
            .await;

        match cache.get(&key, Some(&stored.etag)).await {
            CacheLookup::NotModified { etag } => assert_eq!(etag, stored.etag),
            _ => panic!("expected not modified"),
        }
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let mut config = CacheConfig::default();
        config.default_ttl_seconds = 0;
        let cache = ResponseCache::new(config);
        let key = "k".to_string();
        cache
            .put(key.clone(), b"x".to_vec(), "application/json".to_string(), vec![])
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(cache.get(&key, None).await, CacheLookup::Miss));
    }

    #[test]
    fn cacheable_allow_list_ignores_parameters() {
        assert!(is_cacheable_content_type(
            "multipart/related; type=\"application/dicom\"; boundary=x"
        ));
        assert!(!is_cacheable_content_type("text/html"));
    }

    #[test]
    fn canonical_key_sorts_query_pairs() {
        let a = canonical_key(
            "/studies",
            &[("b".into(), "2".into()), ("a".into(), "1".into())],
            "application/dicom+json",
        );
        let b = canonical_key(
            "/studies",
            &[("a".into(), "1".into()), ("b".into(), "2".into())],
            "application/dicom+json",
        );
        assert_eq!(a, b);
    }
}
