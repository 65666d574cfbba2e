// 路线获取
// 调用外部路线服务，失败时退化为起终点直线

pub mod client;

use std::sync::Arc;

use serde::Deserialize;

pub use client::{FetchError, HttpFetcher, JsonFetcher};

use crate::geo::{Point, encode};

const OK_CODE: &str = "Ok";

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    geometry: RouteGeometry,
}

#[derive(Debug, Deserialize)]
struct RouteGeometry {
    // 路线服务返回 [lng, lat]
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, thiserror::Error)]
enum RouteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unexpected response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("routing service answered {0}")]
    NotOk(String),

    #[error("no usable route in response")]
    Empty,
}

pub struct RouteProvider {
    fetcher: Arc<dyn JsonFetcher>,
    base_url: String,
    profile: String,
}

impl RouteProvider {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, base_url: &str, profile: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
        }
    }

    pub fn route_url(&self, source: Point, destination: Point) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, self.profile, source.lng, source.lat, destination.lng, destination.lat
        )
    }

    /// 返回编码后的路线。任何失败都返回两点直线，不会报错也不会重试
    pub async fn get_route(&self, source: Point, destination: Point) -> String {
        match self.fetch_route(source, destination).await {
            Ok(points) => {
                tracing::debug!("Routing service returned {} points", points.len());
                encode(&points)
            }
            Err(e) => {
                tracing::warn!(
                    "Routing service unavailable, falling back to straight line: {}",
                    e
                );
                encode(&[source, destination])
            }
        }
    }

    async fn fetch_route(&self, source: Point, destination: Point) -> Result<Vec<Point>, RouteError> {
        let body = self
            .fetcher
            .fetch_json(&self.route_url(source, destination))
            .await?;
        let response: RouteResponse = serde_json::from_value(body)?;

        if response.code != OK_CODE {
            return Err(RouteError::NotOk(response.code));
        }
        let route = response.routes.into_iter().next().ok_or(RouteError::Empty)?;

        let points = route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lng, lat]| Point::new(lat, lng))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| RouteError::Empty)?;
        if points.len() < 2 {
            return Err(RouteError::Empty);
        }
        Ok(points)
    }
}
