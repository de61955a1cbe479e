// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Olson name to Linux TZ resolution on top of the two-tier table cache.
//!
//! The in-memory tier is the [`TimezoneResolver`] itself: the first resolution (or the first one
//! after the memory TTL lapses) walks persistent tier, then network, and installs the parsed table.
//! Later resolutions read the installed table until it expires.
//!
//! Loads are single-flight. Concurrent cold requests wait for the one load in progress and then
//! share its table.

use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheStore, CacheWrite},
    error::FetchError,
    http::Fetcher,
    table::{self, MappingTable, ParsedTable, TableMetadata},
    tz_shape::is_valid_linux_tz,
};

/// Returned whenever a zone cannot be mapped to a valid TZ string.
pub const DEFAULT_TZ: &str = "UTC";

/// Stand-in zone name for requests that carry no timezone. It never matches a table key.
pub const NOT_PROVIDED: &str = "Not Provided";

/// Which tier supplied the table used for a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOrigin {
    Memory,
    Persistent,
    Network,
    /// The memory TTL lapsed and reloading failed, so the expired table was used.
    Stale,
}

/// Why a resolution fell back to [`DEFAULT_TZ`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    UnknownZone,
    InvalidTzString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Mapped(String),
    Defaulted(Fallback),
}

impl Lookup {
    pub fn linux_tz(&self) -> &str {
        match self {
            Lookup::Mapped(tz) => tz,
            Lookup::Defaulted(_) => DEFAULT_TZ,
        }
    }
}

/// Look `olson` up in `table` and validate the result.
pub fn lookup(table: &MappingTable, olson: &str) -> Lookup {
    match table.get(olson) {
        None => Lookup::Defaulted(Fallback::UnknownZone),
        Some(tz) if is_valid_linux_tz(tz) => Lookup::Mapped(tz.to_string()),
        Some(_) => Lookup::Defaulted(Fallback::InvalidTzString),
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub olson: String,
    pub lookup: Lookup,
    pub origin: TableOrigin,
    pub metadata: TableMetadata,
}

impl Resolution {
    pub fn linux_tz(&self) -> &str {
        self.lookup.linux_tz()
    }
}

/// Result of an explicit [`TimezoneResolver::refresh`].
pub struct Refresh {
    pub origin: TableOrigin,
    /// The background write to the persistent tier, present when the table came from the network.
    pub write_through: Option<JoinHandle<CacheWrite>>,
}

struct ActiveTable {
    parsed: ParsedTable,
    loaded_at: Instant,
}

pub struct TimezoneResolver {
    cache: CacheStore,
    fetcher: Fetcher,
    /// `None` keeps a loaded table for the lifetime of the process.
    memory_ttl: Option<Duration>,
    active: RwLock<Option<Arc<ActiveTable>>>,
    loading: Mutex<()>,
}

impl TimezoneResolver {
    pub fn new(cache: CacheStore, fetcher: Fetcher, memory_ttl: Option<Duration>) -> Self {
        Self {
            cache,
            fetcher,
            memory_ttl,
            active: RwLock::new(None),
            loading: Mutex::new(()),
        }
    }

    /// Resolve an Olson zone name to a Linux TZ string, loading the table first if needed.
    ///
    /// # Errors
    ///
    /// Only fails when no table is available at all: the memory tier is cold, the persistent tier
    /// misses and the network fetch fails. Unknown zones and malformed values resolve to
    /// [`DEFAULT_TZ`].
    pub async fn resolve(&self, olson: &str) -> Result<Resolution, FetchError> {
        let (active, origin) = self.current_table().await?;
        let lookup = lookup(&active.parsed.table, olson);

        if let Lookup::Defaulted(fallback) = &lookup {
            debug!("Falling back to {} for \"{}\": {:?}", DEFAULT_TZ, olson, fallback);
        }

        Ok(Resolution {
            olson: olson.to_string(),
            lookup,
            origin,
            metadata: active.parsed.metadata.clone(),
        })
    }

    /// Reload the table from the persistent tier or the network, ignoring the memory tier.
    pub async fn refresh(&self) -> Result<Refresh, FetchError> {
        let _guard = self.loading.lock().await;
        let (_, origin, write_through) = self.reload().await?;
        Ok(Refresh {
            origin,
            write_through,
        })
    }

    #[cfg(test)]
    pub fn is_warm(&self) -> bool {
        self.fresh_table().is_some()
    }

    /// Metadata of the installed table, expired or not.
    pub fn metadata(&self) -> Option<TableMetadata> {
        self.installed_table()
            .map(|active| active.parsed.metadata.clone())
    }

    async fn current_table(&self) -> Result<(Arc<ActiveTable>, TableOrigin), FetchError> {
        if let Some(active) = self.fresh_table() {
            return Ok((active, TableOrigin::Memory));
        }

        let _guard = self.loading.lock().await;

        // another request may have finished loading while we waited
        if let Some(active) = self.fresh_table() {
            return Ok((active, TableOrigin::Memory));
        }

        match self.reload().await {
            Ok((active, origin, _)) => Ok((active, origin)),
            Err(err) => match self.installed_table() {
                Some(stale) => {
                    warn!("Failed to reload timezone data, serving expired table: {}", err);
                    Ok((stale, TableOrigin::Stale))
                },
                None => Err(err),
            },
        }
    }

    async fn reload(
        &self,
    ) -> Result<(Arc<ActiveTable>, TableOrigin, Option<JoinHandle<CacheWrite>>), FetchError> {
        if let Some(text) = self.cache.load().await.into_text() {
            let parsed = table::parse(&text);
            if !parsed.table.is_empty() {
                let active = self.install(parsed, TableOrigin::Persistent);
                return Ok((active, TableOrigin::Persistent, None));
            }
            warn!("Cached timezone data is empty, fetching {}", self.fetcher.url());
        }

        let text = self.fetcher.fetch_text().await?;
        let parsed = table::parse(&text);
        if parsed.table.is_empty() {
            return Err(FetchError::EmptyTable);
        }
        let active = self.install(parsed, TableOrigin::Network);

        let cache = self.cache.clone();
        let write_through = tokio::spawn(async move { cache.store(&text).await });

        Ok((active, TableOrigin::Network, Some(write_through)))
    }

    fn install(&self, parsed: ParsedTable, origin: TableOrigin) -> Arc<ActiveTable> {
        info!(
            "Loaded {} timezones from {:?} (tzdata {}, built {})",
            parsed.table.len(),
            origin,
            parsed.metadata.version().unwrap_or("unknown"),
            parsed.metadata.build().unwrap_or("unknown"),
        );

        let active = Arc::new(ActiveTable {
            parsed,
            loaded_at: Instant::now(),
        });
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(active.clone());
        active
    }

    fn installed_table(&self) -> Option<Arc<ActiveTable>> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn fresh_table(&self) -> Option<Arc<ActiveTable>> {
        self.installed_table().filter(|active| match self.memory_ttl {
            Some(ttl) => active.loaded_at.elapsed() < ttl,
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::task::JoinSet;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::{lookup, Fallback, Lookup, TableOrigin, DEFAULT_TZ, NOT_PROVIDED};
    use crate::{
        cache::{tests::BrokenKv, CacheWrite, KvStore, MemoryKv},
        error::FetchError,
        table,
        test_utils::utils::{mount_table, new_resolver, TABLE},
    };

    #[test]
    fn lookup_outcomes() {
        let parsed = table::parse(TABLE);

        assert_eq!(
            lookup(&parsed.table, "Europe/London"),
            Lookup::Mapped("GMT0BST,M3.5.0/1,M10.5.0".into())
        );
        assert_eq!(
            lookup(&parsed.table, "Mars/Olympus_Mons"),
            Lookup::Defaulted(Fallback::UnknownZone)
        );
        assert_eq!(
            lookup(&parsed.table, NOT_PROVIDED),
            Lookup::Defaulted(Fallback::UnknownZone)
        );
        assert_eq!(
            lookup(&parsed.table, "Test/Lowercase"),
            Lookup::Defaulted(Fallback::InvalidTzString)
        );
        assert_eq!(
            lookup(&parsed.table, "Test/Empty"),
            Lookup::Defaulted(Fallback::InvalidTzString)
        );
        assert_eq!(
            lookup(&parsed.table, "Test/Bracketed"),
            Lookup::Defaulted(Fallback::InvalidTzString)
        );
        assert_eq!(Lookup::Defaulted(Fallback::UnknownZone).linux_tz(), DEFAULT_TZ);
    }

    #[tokio::test]
    async fn fetches_once_then_serves_from_memory() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 1).await;
        let resolver = new_resolver(&mock_server, None, None);

        assert!(!resolver.is_warm());
        let first = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(first.linux_tz(), "GMT0BST,M3.5.0/1,M10.5.0");
        assert_eq!(first.origin, TableOrigin::Network);
        assert_eq!(first.metadata.version(), Some("2025c"));
        assert_eq!(first.metadata.build(), Some("2025-12-19 01:09:27 UTC"));
        assert!(resolver.is_warm());

        let second = resolver.resolve("America/New_York").await.unwrap();
        assert_eq!(second.linux_tz(), "EST5EDT,M3.2.0,M11.1.0");
        assert_eq!(second.origin, TableOrigin::Memory);
    }

    #[tokio::test]
    async fn fallbacks() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 1).await;
        let resolver = new_resolver(&mock_server, None, None);

        let unknown = resolver.resolve("Mars/Olympus_Mons").await.unwrap();
        assert_eq!(unknown.linux_tz(), "UTC");
        assert_eq!(unknown.lookup, Lookup::Defaulted(Fallback::UnknownZone));

        let missing = resolver.resolve(NOT_PROVIDED).await.unwrap();
        assert_eq!(missing.linux_tz(), "UTC");

        let invalid = resolver.resolve("Test/Lowercase").await.unwrap();
        assert_eq!(invalid.linux_tz(), "UTC");
        assert_eq!(invalid.lookup, Lookup::Defaulted(Fallback::InvalidTzString));
    }

    #[tokio::test]
    async fn persistent_hit_is_preferred() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 0).await;

        let kv = Arc::new(MemoryKv::new());
        kv.put("timezones.db", "Asia/Tokyo JST-9\n", Duration::from_secs(60))
            .await
            .unwrap();
        let resolver = new_resolver(&mock_server, Some(kv), None);

        let resolution = resolver.resolve("Asia/Tokyo").await.unwrap();
        assert_eq!(resolution.linux_tz(), "JST-9");
        assert_eq!(resolution.origin, TableOrigin::Persistent);
        assert_eq!(resolution.metadata.version(), None);
    }

    #[tokio::test]
    async fn empty_persistent_entry_is_a_miss() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 1).await;

        let kv = Arc::new(MemoryKv::new());
        kv.put("timezones.db", "# nothing here\n", Duration::from_secs(60))
            .await
            .unwrap();
        let resolver = new_resolver(&mock_server, Some(kv), None);

        let resolution = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(resolution.origin, TableOrigin::Network);
    }

    #[tokio::test]
    async fn expired_persistent_entry_falls_through() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 1).await;

        let kv = Arc::new(MemoryKv::new());
        kv.put("timezones.db", "Asia/Tokyo JST-9\n", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let resolver = new_resolver(&mock_server, Some(kv), None);

        let resolution = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(resolution.linux_tz(), "GMT0BST,M3.5.0/1,M10.5.0");
        assert_eq!(resolution.origin, TableOrigin::Network);
    }

    #[tokio::test]
    async fn empty_network_table_stays_cold() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# only a comment\n"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_table(&mock_server, 1).await;

        let kv = Arc::new(MemoryKv::new());
        let resolver = new_resolver(
            &mock_server,
            Some(kv.clone()),
            Some(Duration::from_secs(86400)),
        );

        let err = resolver.resolve("Europe/London").await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyTable));
        assert!(!resolver.is_warm());
        assert_eq!(kv.get("timezones.db").await.unwrap(), None);

        let resolution = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(resolution.linux_tz(), "GMT0BST,M3.5.0/1,M10.5.0");
        assert_eq!(resolution.origin, TableOrigin::Network);
    }

    #[tokio::test]
    async fn write_through() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 1).await;

        let kv = Arc::new(MemoryKv::new());
        let resolver = new_resolver(&mock_server, Some(kv.clone()), None);

        let refresh = resolver.refresh().await.unwrap();
        assert_eq!(refresh.origin, TableOrigin::Network);
        let write = refresh.write_through.unwrap().await.unwrap();
        assert!(matches!(write, CacheWrite::Stored));
        assert_eq!(kv.get("timezones.db").await.unwrap().as_deref(), Some(TABLE));

        // a second resolver sharing the store never touches the network
        let other = new_resolver(&mock_server, Some(kv), None);
        let resolution = other.resolve("Europe/London").await.unwrap();
        assert_eq!(resolution.origin, TableOrigin::Persistent);
    }

    #[tokio::test]
    async fn broken_persistent_tier_falls_through() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 1).await;
        let resolver = new_resolver(&mock_server, Some(Arc::new(BrokenKv)), None);

        let refresh = resolver.refresh().await.unwrap();
        assert_eq!(refresh.origin, TableOrigin::Network);
        let write = refresh.write_through.unwrap().await.unwrap();
        assert!(matches!(write, CacheWrite::Failed(_)));

        let resolution = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(resolution.linux_tz(), "GMT0BST,M3.5.0/1,M10.5.0");
        assert_eq!(resolution.origin, TableOrigin::Memory);
    }

    #[tokio::test]
    async fn fetch_failure_stays_cold() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_table(&mock_server, 1).await;

        let resolver = new_resolver(&mock_server, Some(Arc::new(MemoryKv::new())), None);

        let err = resolver.resolve("Europe/London").await.unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 500));
        assert!(!resolver.is_warm());
        assert!(resolver.metadata().is_none());

        let resolution = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(resolution.linux_tz(), "GMT0BST,M3.5.0/1,M10.5.0");
        assert_eq!(resolution.origin, TableOrigin::Network);
    }

    #[tokio::test]
    async fn memory_ttl_expiry_reloads() {
        let mock_server = MockServer::start().await;
        mount_table(&mock_server, 2).await;
        let resolver = new_resolver(&mock_server, None, Some(Duration::from_millis(50)));

        let first = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(first.origin, TableOrigin::Network);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!resolver.is_warm());

        let second = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(second.origin, TableOrigin::Network);
    }

    #[tokio::test]
    async fn expired_table_served_when_reload_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TABLE))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let resolver = new_resolver(&mock_server, None, Some(Duration::from_millis(50)));
        resolver.resolve("Europe/London").await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let resolution = resolver.resolve("Europe/London").await.unwrap();
        assert_eq!(resolution.linux_tz(), "GMT0BST,M3.5.0/1,M10.5.0");
        assert_eq!(resolution.origin, TableOrigin::Stale);
        assert_eq!(
            resolver.metadata().and_then(|m| m.version().map(String::from)),
            Some("2025c".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_cold_requests_fetch_once() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(TABLE)
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let resolver = Arc::new(new_resolver(&mock_server, None, None));
        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            tasks.spawn(async move { resolver.resolve("Europe/London").await });
        }

        let mut origins = Vec::new();
        while let Some(result) = tasks.join_next().await {
            let resolution = result.unwrap().unwrap();
            assert_eq!(resolution.linux_tz(), "GMT0BST,M3.5.0/1,M10.5.0");
            origins.push(resolution.origin);
        }
        assert_eq!(
            origins
                .iter()
                .filter(|o| **o == TableOrigin::Network)
                .count(),
            1
        );
    }
}
