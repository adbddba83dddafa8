//! The provider-state handler.

use std::sync::Arc;

use tracing::debug;

use elephant_proto::messages::ProviderStateRequest;
use elephant_proto::{ConnectionWriter, Format, ProtocolError, Status, decode_payload};

use crate::Service;

/// Handle one state frame: one `StateItem`, then `Done`.
///
/// The response's `provider` field echoes the requested key verbatim so
/// `menus:<x>` round-trips.
pub async fn handle(
    service: &Arc<Service>,
    writer: &Arc<ConnectionWriter>,
    format: Format,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let request: ProviderStateRequest = decode_payload(format, payload)?;

    let Some(provider) = service.registry.resolve(&request.provider) else {
        debug!(provider = %request.provider, "unknown provider in state request");
        return Ok(());
    };

    let mut response = provider.state(&request.provider);
    response.provider = request.provider;

    writer
        .write_message(Status::StateItem, format, &response)
        .await?;
    writer.write_status(Status::Done).await
}
