//! Endpoint resolver module
//!
//! Turns the user's targeting flags into concrete endpoint IDs. Names and
//! search terms are matched against the endpoint catalog, which is read from
//! the local cache when it is still valid and fetched from the server
//! otherwise.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::cache::EndpointCache;
use crate::error::{ExecError, Result};
use crate::types::{ResolvedTargets, TargetSelector};
use fleet_client::EndpointSource;
use fleet_core::domain::endpoint::Endpoint;

/// Resolves targeting flags into endpoint IDs
pub struct EndpointResolver<'a> {
    source: &'a dyn EndpointSource,
    cache: Option<&'a EndpointCache>,
}

impl<'a> EndpointResolver<'a> {
    /// Create a resolver
    ///
    /// # Arguments
    /// * `source` - Remote listing API used on a cache miss
    /// * `cache` - Local catalog cache, `None` to always fetch
    pub fn new(source: &'a dyn EndpointSource, cache: Option<&'a EndpointCache>) -> Self {
        Self { source, cache }
    }

    /// Resolve a selector to the IDs a submission should target
    ///
    /// IDs and group IDs are returned as given. Names and search terms are
    /// matched case-insensitively as prefixes of endpoint display names.
    ///
    /// # Errors
    /// Returns an error if:
    /// - A term matches no endpoint
    /// - A name matches more than one endpoint (ambiguous)
    /// - The catalog cannot be read from the cache or fetched
    pub async fn resolve(&self, selector: &TargetSelector) -> Result<ResolvedTargets> {
        match selector {
            TargetSelector::ClientIds(ids) => Ok(ResolvedTargets {
                client_ids: ids.clone(),
                group_ids: Vec::new(),
            }),
            TargetSelector::GroupIds(ids) => Ok(ResolvedTargets {
                client_ids: Vec::new(),
                group_ids: ids.clone(),
            }),
            TargetSelector::Names(names) => {
                let catalog = self.catalog().await?;
                Ok(ResolvedTargets {
                    client_ids: match_terms(&catalog, names, true)?,
                    group_ids: Vec::new(),
                })
            }
            TargetSelector::Search(terms) => {
                let catalog = self.catalog().await?;
                Ok(ResolvedTargets {
                    client_ids: match_terms(&catalog, terms, false)?,
                    group_ids: Vec::new(),
                })
            }
        }
    }

    /// Get the endpoint catalog, from cache when possible
    async fn catalog(&self) -> Result<Vec<Endpoint>> {
        if let Some(cache) = self.cache {
            if let Some(endpoints) = cache.load()? {
                debug!("Using {} cached endpoint(s)", endpoints.len());
                return Ok(endpoints);
            }
        }

        let endpoints = self.source.list_endpoints().await?;
        info!("Fetched {} endpoint(s) from the server", endpoints.len());

        if let Some(cache) = self.cache {
            cache.store(&endpoints)?;
        }

        Ok(endpoints)
    }
}

/// Match each term against endpoint names, deduplicating by ID
///
/// With `exact` set, a term matching more than one endpoint is ambiguous.
fn match_terms(catalog: &[Endpoint], terms: &[String], exact: bool) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for term in terms {
        let matches: Vec<&Endpoint> = catalog
            .iter()
            .filter(|endpoint| endpoint.name_starts_with(term))
            .collect();

        match matches.len() {
            0 => return Err(ExecError::UnknownClients(term.clone())),
            n if exact && n > 1 => {
                let described: Vec<String> = matches
                    .iter()
                    .map(|endpoint| format!("{} ({})", endpoint.name, endpoint.id))
                    .collect();
                return Err(ExecError::AmbiguousName {
                    name: term.clone(),
                    matches: described.join(", "),
                });
            }
            _ => {}
        }

        for endpoint in matches {
            if seen.insert(endpoint.id.clone()) {
                ids.push(endpoint.id.clone());
            }
        }
    }

    Ok(ids)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleet_client::ClientError;
    use fleet_core::domain::endpoint::ConnectionState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) struct FakeSource {
        endpoints: Vec<Endpoint>,
        calls: AtomicUsize,
        pub(crate) fail: bool,
    }

    impl FakeSource {
        pub(crate) fn new(names: &[(&str, &str)]) -> Self {
            Self {
                endpoints: names
                    .iter()
                    .map(|(id, name)| Endpoint {
                        id: id.to_string(),
                        name: name.to_string(),
                        connection_state: ConnectionState::Connected,
                        os: String::new(),
                        tags: vec![],
                        ipv4: vec![],
                        ipv6: vec![],
                        address: String::new(),
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EndpointSource for FakeSource {
        async fn list_endpoints(&self) -> fleet_client::Result<Vec<Endpoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::api_error(500, "listing unavailable"));
            }
            Ok(self.endpoints.clone())
        }
    }

    pub(crate) fn catalog() -> FakeSource {
        FakeSource::new(&[
            ("11344", "some client 11344"),
            ("11345", "some client 11345"),
            ("200", "db-primary"),
            ("201", "db-replica"),
        ])
    }

    fn names(values: &[&str]) -> TargetSelector {
        TargetSelector::Names(values.iter().map(|v| v.to_string()).collect())
    }

    #[tokio::test]
    async fn test_ids_returned_verbatim_without_fetch() {
        let source = catalog();
        let resolver = EndpointResolver::new(&source, None);

        let targets = resolver
            .resolve(&TargetSelector::ClientIds(vec!["9".to_string(), "1".to_string()]))
            .await
            .unwrap();

        assert_eq!(targets.client_ids, vec!["9", "1"]);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_groups_returned_verbatim() {
        let source = catalog();
        let resolver = EndpointResolver::new(&source, None);

        let targets = resolver
            .resolve(&TargetSelector::GroupIds(vec!["333".to_string()]))
            .await
            .unwrap();

        assert!(targets.client_ids.is_empty());
        assert_eq!(targets.group_ids, vec!["333"]);
    }

    #[tokio::test]
    async fn test_two_names_resolve_in_order() {
        let source = catalog();
        let resolver = EndpointResolver::new(&source, None);

        let targets = resolver
            .resolve(&names(&["some client 11344", "some client 11345"]))
            .await
            .unwrap();

        assert_eq!(targets.client_ids, vec!["11344", "11345"]);
    }

    #[tokio::test]
    async fn test_unknown_name() {
        let source = catalog();
        let resolver = EndpointResolver::new(&source, None);

        let err = resolver.resolve(&names(&["X"])).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown client(s) 'X'");
    }

    #[tokio::test]
    async fn test_ambiguous_name() {
        let source = catalog();
        let resolver = EndpointResolver::new(&source, None);

        let err = resolver.resolve(&names(&["db"])).await.unwrap_err();
        assert!(matches!(err, ExecError::AmbiguousName { .. }));
        assert!(err.to_string().contains("ambiguous"));
        assert!(err.to_string().contains("db-replica (201)"));
    }

    #[tokio::test]
    async fn test_search_returns_all_matches_deduplicated() {
        let source = catalog();
        let resolver = EndpointResolver::new(&source, None);

        let selector = TargetSelector::Search(vec!["DB".to_string(), "db-p".to_string()]);
        let targets = resolver.resolve(&selector).await.unwrap();

        assert_eq!(targets.client_ids, vec!["200", "201"]);
    }

    #[tokio::test]
    async fn test_cache_is_transparent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EndpointCache::new(dir.path().join("clients.json"), Duration::from_secs(600));
        let source = catalog();
        let selector = TargetSelector::Search(vec!["some".to_string()]);

        let live = EndpointResolver::new(&source, None)
            .resolve(&selector)
            .await
            .unwrap();

        let resolver = EndpointResolver::new(&source, Some(&cache));
        let first = resolver.resolve(&selector).await.unwrap();
        let cached = resolver.resolve(&selector).await.unwrap();

        assert_eq!(live, first);
        assert_eq!(first, cached);
        // one live fetch without cache, one refresh on the cache miss
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_listing_error_is_surfaced() {
        let mut source = catalog();
        source.fail = true;
        let resolver = EndpointResolver::new(&source, None);

        let err = resolver.resolve(&names(&["db-primary"])).await.unwrap_err();
        assert!(matches!(err, ExecError::Client(_)));
        assert!(err.to_string().contains("listing unavailable"));
    }
}
