pub mod credentials;
pub mod metrics;
pub mod providers;
pub mod recipients;

pub use credentials::{AccessTokenSource, ServiceAccountKey};
pub use metrics::{get_metrics, init_metrics, record_provider_call, record_relay_outcome};
pub use providers::{
    FcmProvider, MockPushProvider, ProviderError, ProviderResponse, PushProvider,
};
pub use recipients::{InMemoryRecipientStore, MongoRecipientStore, RecipientStore};
