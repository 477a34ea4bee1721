//! Endpoint listing

use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use tracing::debug;

use crate::FleetClient;
use crate::error::Result;
use fleet_core::domain::endpoint::Endpoint;
use fleet_core::dto::response::Data;

/// Number of endpoints requested per page
const PAGE_LIMIT: usize = 500;

/// Source of the endpoint catalog
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Fetch every endpoint visible to the current user
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>>;
}

impl FleetClient {
    // =============================================================================
    // Endpoints
    // =============================================================================

    /// Fetch one page of endpoints
    ///
    /// # Arguments
    /// * `offset` - Number of endpoints to skip
    /// * `limit` - Maximum number of endpoints to return
    pub async fn list_endpoints_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Data<Vec<Endpoint>>> {
        let url = format!("{}/api/v1/clients", self.base_url);
        let request = self.client.get(&url).query(&[
            ("page[limit]", limit.to_string()),
            ("page[offset]", offset.to_string()),
        ]);
        let response = self.auth.apply(request).send().await?;

        self.handle_response(response).await
    }
}

#[async_trait]
impl EndpointSource for FleetClient {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        collect_pages(PAGE_LIMIT, |offset| self.list_endpoints_page(offset, PAGE_LIMIT)).await
    }
}

/// Fetch pages until a short page, a page with no new endpoint, or the
/// advertised total
async fn collect_pages<F, Fut>(limit: usize, mut fetch: F) -> Result<Vec<Endpoint>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Data<Vec<Endpoint>>>>,
{
    let mut endpoints = Vec::new();
    let mut seen = HashSet::new();

    loop {
        let page = fetch(endpoints.len()).await?;
        let received = page.data.len();
        let before = endpoints.len();

        for endpoint in page.data {
            if seen.insert(endpoint.id.clone()) {
                endpoints.push(endpoint);
            }
        }
        let added = endpoints.len() - before;

        debug!(received, added, total = endpoints.len(), "fetched endpoint page");

        let reached_count = page
            .meta
            .is_some_and(|meta| endpoints.len() >= meta.count);
        if received < limit || added == 0 || reached_count {
            break;
        }
    }

    Ok(endpoints)
}
