//! Per-frame request handlers.
//!
//! Each decoded frame runs on its own task. Handlers decode the payload
//! in the request's format, do their work through the registry, and
//! answer through the connection writer in that same format. A payload
//! that fails to decode drops the frame and nothing else.

mod activate;
mod menu;
mod query;
mod state;
mod subscribe;

use std::sync::Arc;

use tracing::warn;

use elephant_proto::{ConnectionWriter, RequestFrame, RequestType};

use crate::Service;

/// Route one frame to its handler.
pub async fn dispatch(frame: RequestFrame, writer: Arc<ConnectionWriter>, service: Arc<Service>) {
    let format = frame.format;
    let payload = frame.payload;

    let result = match frame.request {
        RequestType::Query => query::handle(&service, &writer, format, &payload).await,
        RequestType::Activate => activate::handle(&service, &writer, format, &payload).await,
        RequestType::Subscribe => subscribe::handle(&service, &writer, format, &payload),
        RequestType::MenuNotify => menu::handle(&service, format, &payload),
        RequestType::ProviderState => state::handle(&service, &writer, format, &payload).await,
    };

    if let Err(err) = result {
        // Transport errors surface through the reader task noticing the
        // dead stream; everything else is frame-local.
        warn!(cid = writer.cid(), request = ?frame.request, error = %err, "handler failed");
    }
}
