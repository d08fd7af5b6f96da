//! Application state wiring the engine to the concrete adapters.
//!
//! The engine is generic over its ports; AppState pins them to the REST
//! client, the SQLite cache, the SSE transport and the HTTP image fetcher.

use std::sync::Arc;

use farmlink_core::chat::MessageStore;
use farmlink_core::media::ImageCache;
use farmlink_core::session::SessionResolver;
use farmlink_infra::auth::EnvTokenProvider;
use farmlink_infra::config::{image_dir, load_client_config, resolve_data_dir};
use farmlink_infra::http::HttpMarketplaceClient;
use farmlink_infra::media::HttpImageFetcher;
use farmlink_infra::realtime::SseTransport;
use farmlink_infra::sqlite::conversation::SqliteConversationCache;
use farmlink_infra::sqlite::pool::{DatabasePool, database_url};
use farmlink_types::config::ClientConfig;
use farmlink_types::message::ConversationKey;

pub type ConcreteApi = HttpMarketplaceClient<EnvTokenProvider>;

pub type ConcreteStore = MessageStore<ConcreteApi, SqliteConversationCache>;

pub struct AppState {
    pub config: ClientConfig,
    pub api: Arc<ConcreteApi>,
    pub cache: Arc<SqliteConversationCache>,
    pub transport: SseTransport<EnvTokenProvider>,
    pub images: ImageCache<HttpImageFetcher>,
}

impl AppState {
    /// Resolve the data directory, load config, open the database and build
    /// the adapters. Nothing here touches the network.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_client_config(&data_dir).await;
        tracing::debug!(base_url = %config.base_url, data_dir = %data_dir.display(), "loaded client config");

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let cache = Arc::new(SqliteConversationCache::new(db_pool));

        let api = Arc::new(HttpMarketplaceClient::new(&config, EnvTokenProvider::new())?);
        let transport = SseTransport::new(&config, EnvTokenProvider::new())?;

        let images_root = image_dir(&data_dir);
        tokio::fs::create_dir_all(&images_root).await?;
        let images = ImageCache::new(HttpImageFetcher::new(&config)?, images_root, &config.image_cache);

        Ok(Self {
            config,
            api,
            cache,
            transport,
            images,
        })
    }

    pub fn store(&self, key: ConversationKey) -> ConcreteStore {
        MessageStore::new(key, self.api.clone(), self.cache.clone())
    }

    pub fn resolver(&self) -> SessionResolver<ConcreteApi> {
        SessionResolver::new(self.api.clone(), self.config.session_allocation)
    }
}
