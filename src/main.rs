use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use geotrack::{
    AppState,
    cache::SystemClock,
    config::Config,
    database::Stores,
    middleware::RateLimiter,
    router::create_router,
    routing::HttpFetcher,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 按配置选择存储实现，只在启动时决定一次
    let stores = Stores::connect(&config)
        .await
        .expect("Failed to initialise store");

    let fetcher =
        HttpFetcher::new(config.routing_timeout()).expect("Failed to build routing client");
    tracing::info!(
        "Routing via {} (timeout {:?})",
        config.routing_base_url,
        config.routing_timeout()
    );

    let state = AppState::new(
        config.clone(),
        stores,
        Arc::new(fetcher),
        Arc::new(SystemClock),
    );

    // 配置了 Redis 才启用限流
    let rate_limiter = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).expect("Failed to create Redis client");
            tracing::info!("Rate limiting enabled");
            Some(Arc::new(RateLimiter::new(client, &config)))
        }
        None => {
            tracing::info!("REDIS_URL not set, rate limiting disabled");
            None
        }
    };

    let router = create_router(state, rate_limiter);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
