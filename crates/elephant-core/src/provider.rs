//! The provider contract.
//!
//! A provider is a self-contained source of searchable items. The daemon
//! only ever talks to this trait; everything else (configuration, caches,
//! disk artifacts, external processes) is the provider's own business.

use std::sync::Arc;

use async_trait::async_trait;

use elephant_proto::messages::{Item, ProviderStateResponse};
use elephant_proto::{ConnectionWriter, Format};

/// Per-query context handed into [`Provider::query`].
///
/// Carries what a provider needs to push async item updates back into
/// the originating query stream after its `query` call returned.
#[derive(Debug, Clone)]
pub struct QueryContext {
    writer: Arc<ConnectionWriter>,
    format: Format,
    query: String,
}

impl QueryContext {
    #[must_use]
    pub fn new(writer: Arc<ConnectionWriter>, format: Format, query: impl Into<String>) -> Self {
        Self {
            writer,
            format,
            query: query.into(),
        }
    }

    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// The query text that produced this stream.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Replace an already-emitted item on the originating connection.
    ///
    /// The revised item shares its identifier with the original; a text
    /// of [`DELETE_SENTINEL`](elephant_proto::DELETE_SENTINEL) tells the
    /// client to drop it instead. Writes after the client closed are
    /// discarded.
    pub async fn update_item(&self, item: &Item) {
        self.writer.update_item(self.format, item).await;
    }
}

/// Everything an activation carries.
#[derive(Debug)]
pub struct Activation<'a> {
    /// The item's identifier, byte-identical to what the provider
    /// emitted.
    pub identifier: &'a str,
    pub action: &'a str,
    /// Query that produced the activated item.
    pub query: &'a str,
    /// Free-form arguments from the front-end.
    pub arguments: &'a str,
    /// Whether the originating query targeted only this provider.
    pub single: bool,
    pub format: Format,
    pub writer: &'a Arc<ConnectionWriter>,
}

/// The capability set every provider satisfies.
///
/// `query` returns synchronously (background work goes through
/// [`QueryContext::update_item`]); `activate` may block on processes or
/// the clipboard. Implementations must not hold shared locks across
/// process execution.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable name used on the wire and in config file names.
    fn name(&self) -> &'static str;

    /// Human-readable name for provider listings.
    fn name_pretty(&self) -> String;

    fn icon(&self) -> String {
        String::new()
    }

    fn hide_from_provider_list(&self) -> bool {
        false
    }

    /// Whether the provider can run on this system. Checked once after
    /// load; unavailable providers are not registered.
    fn available(&self) -> bool {
        true
    }

    /// One-time startup work, run concurrently for all providers.
    async fn setup(&self) {}

    /// Markdown documentation including the config reference.
    fn doc(&self) -> String;

    async fn query(&self, ctx: &QueryContext, query: &str, single: bool, exact: bool)
    -> Vec<Item>;

    async fn activate(&self, activation: Activation<'_>);

    /// Current UI state. `provider_key` is the key the client asked for,
    /// including a `menus:` qualifier.
    fn state(&self, provider_key: &str) -> ProviderStateResponse {
        let _ = provider_key;
        ProviderStateResponse::default()
    }
}
