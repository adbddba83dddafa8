//! The query handler: fan out, rank, stream.

use std::sync::Arc;

use tracing::debug;

use elephant_core::provider::QueryContext;
use elephant_proto::messages::{QueryRequest, compare_ranked};
use elephant_proto::{ConnectionWriter, Format, ProtocolError, Status, decode_payload};

use crate::Service;

/// Handle one query frame.
///
/// Each named provider answers in turn; its items are sorted, truncated
/// to `maxresults`, and streamed as `QueryItem` frames. A provider with
/// nothing to say still produces one `QueryItemEmpty` so clients can
/// account for it. The stream always ends with exactly one `Done`
/// followed by exactly one `EndOfStream`.
pub async fn handle(
    service: &Arc<Service>,
    writer: &Arc<ConnectionWriter>,
    format: Format,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let request: QueryRequest = decode_payload(format, payload)?;

    if request.providers.is_empty() {
        return Ok(());
    }

    let single = request.providers.len() == 1;

    for key in &request.providers {
        let Some(provider) = service.registry.resolve(key) else {
            debug!(provider = %key, "unknown provider in query");
            continue;
        };

        let provider_query = scoped_query(key, &request.query);
        let ctx = QueryContext::new(Arc::clone(writer), format, provider_query.clone());

        let mut items = provider
            .query(&ctx, &provider_query, single, request.exactsearch)
            .await;

        items.sort_by(compare_ranked);

        if request.maxresults > 0 {
            items.truncate(request.maxresults as usize);
        }

        if items.is_empty() {
            writer.write_status(Status::QueryItemEmpty).await?;
            continue;
        }

        for item in &items {
            writer.write_message(Status::QueryItem, format, item).await?;
        }
    }

    writer.write_status(Status::Done).await?;
    writer.write_status(Status::EndOfStream).await
}

/// The query text a provider sees: addressing `menus:<id>` scopes the
/// query to that menu.
fn scoped_query(key: &str, query: &str) -> String {
    match key.strip_prefix("menus:") {
        Some(menu) if !menu.is_empty() => format!("{menu}:{query}"),
        _ => query.to_string(),
    }
}
