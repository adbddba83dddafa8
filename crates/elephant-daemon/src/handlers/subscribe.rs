//! The subscribe handler.

use std::sync::Arc;

use elephant_proto::messages::SubscribeRequest;
use elephant_proto::{ConnectionWriter, Format, ProtocolError, decode_payload};

use crate::Service;

/// Handle one subscribe frame.
///
/// Interval subscriptions need their provider resolved up front; event
/// subscriptions match by name only and tolerate providers this build
/// does not carry.
pub fn handle(
    service: &Arc<Service>,
    writer: &Arc<ConnectionWriter>,
    format: Format,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let request: SubscribeRequest = decode_payload(format, payload)?;

    let provider = service.registry.resolve(&request.provider).cloned();

    service
        .subscriptions
        .subscribe(&request, provider, Arc::clone(writer), format);

    Ok(())
}
