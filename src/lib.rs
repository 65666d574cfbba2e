use std::sync::Arc;

use cache::{Clock, PathResultCache};
use config::Config;
use database::Stores;
use geo::ProximityMatcher;
use matching::PathMatchingService;
use routing::{JsonFetcher, RouteProvider};

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod geo;
pub mod matching;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod routing;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub matching: Arc<PathMatchingService>,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        fetcher: Arc<dyn JsonFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let routes = RouteProvider::new(
            fetcher,
            &config.routing_base_url,
            &config.routing_profile,
        );
        let matcher = ProximityMatcher::new(
            stores.locations.clone(),
            clock.clone(),
            config.live_window(),
        );
        let cache = PathResultCache::new(config.path_cache_ttl(), clock.clone());
        let matching = PathMatchingService::new(
            stores.paths,
            stores.locations,
            routes,
            matcher,
            cache,
            clock,
        );

        Self {
            config,
            matching: Arc::new(matching),
        }
    }
}
