//! The menu-notify handler.

use std::sync::Arc;

use elephant_proto::messages::MenuRequest;
use elephant_proto::{Format, ProtocolError, decode_payload};

use crate::Service;

/// Handle one menu-notify frame: publish `menus:<menu>` so event
/// subscribers can pivot between menus without re-subscribing.
///
/// A value that is already provider-namespaced (`bluetooth:connect`)
/// passes through untouched, which lets scripts poke any event
/// subscriber through this frame.
pub fn handle(
    service: &Arc<Service>,
    format: Format,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let request: MenuRequest = decode_payload(format, payload)?;

    let value = if request.menu.contains(':') {
        request.menu
    } else {
        format!("menus:{}", request.menu)
    };

    service.subscriptions.notify(value);

    Ok(())
}
