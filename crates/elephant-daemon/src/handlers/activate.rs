//! The activation handler.

use std::sync::Arc;

use tracing::debug;

use elephant_core::provider::Activation;
use elephant_proto::messages::ActivateRequest;
use elephant_proto::{ConnectionWriter, Format, ProtocolError, Status, decode_payload};

use crate::Service;

/// Handle one activation frame.
///
/// Activation is fire-and-forget for the client, but an empty
/// `ActivationFinished` frame trails every synchronous side effect so
/// front-ends can sequence follow-up requests. Provider errors stay in
/// the provider's logs.
pub async fn handle(
    service: &Arc<Service>,
    writer: &Arc<ConnectionWriter>,
    format: Format,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let request: ActivateRequest = decode_payload(format, payload)?;

    let Some(provider) = service.registry.resolve(&request.provider) else {
        debug!(provider = %request.provider, "unknown provider in activation");
        return Ok(());
    };

    provider
        .activate(Activation {
            identifier: &request.identifier,
            action: &request.action,
            query: &request.query,
            arguments: &request.arguments,
            single: request.single,
            format,
            writer,
        })
        .await;

    writer.write_status(Status::ActivationFinished).await
}
