//! Wire protocol for the elephant socket.
//!
//! Front-ends talk to the daemon over a Unix domain socket using framed
//! binary messages. This crate is the single source of truth for that
//! protocol: the message structs, the frame codecs, and the numeric
//! type/status/format assignments.
//!
//! # Wire Format
//!
//! Requests and responses are framed differently. A request carries the
//! wire format it wants answers in; responses inherit it and therefore
//! omit the format byte:
//!
//! ```text
//! request:   type(1) | format(1) | length(4 BE) | payload(length)
//! response:  status(1)           | length(4 BE) | payload(length)
//! ```
//!
//! Payloads are either protobuf (format 0) or JSON (format 1); both carry
//! the same logical messages. The codecs in [`framing`] never interpret
//! payload bytes; [`encode_payload`] and [`decode_payload`] do that,
//! switching on the request's format byte.
//!
//! # Module Overview
//!
//! - [`connection`]: serialized connection writer and a small client
//! - [`error`]: protocol error type ([`ProtocolError`])
//! - [`framing`]: frame codecs ([`RequestCodec`], [`ResponseCodec`])
//! - [`messages`]: the request/response messages and [`Item`]

pub mod connection;
pub mod error;
pub mod framing;
pub mod messages;

pub use connection::{Client, ConnectionWriter};
pub use error::{MAX_FRAME_SIZE, ProtocolError};
pub use framing::{
    Format, RequestCodec, RequestFrame, RequestType, ResponseCodec, ResponseFrame, Status,
};
pub use messages::{
    ActivateRequest, FuzzyInfo, Item, ItemType, MenuRequest, ProviderStateRequest,
    ProviderStateResponse, QueryRequest, SubscribeRequest, SubscribeResponse,
};

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Item text that tells clients to remove the identifier instead of
/// replacing its contents.
pub const DELETE_SENTINEL: &str = "%DELETE%";

/// Encode a message payload in the given wire format.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] when serialization fails.
pub fn encode_payload<T>(format: Format, msg: &T) -> Result<Bytes, ProtocolError>
where
    T: prost::Message + Serialize,
{
    match format {
        Format::Protobuf => Ok(Bytes::from(msg.encode_to_vec())),
        Format::Json => serde_json::to_vec(msg)
            .map(Bytes::from)
            .map_err(|e| ProtocolError::Encode(e.to_string())),
    }
}

/// Decode a message payload in the given wire format.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] when the payload does not parse in
/// the declared format. The dispatcher treats this as a dropped frame,
/// not a dead connection.
pub fn decode_payload<T>(format: Format, payload: &[u8]) -> Result<T, ProtocolError>
where
    T: prost::Message + Default + DeserializeOwned,
{
    match format {
        Format::Protobuf => {
            T::decode(payload).map_err(|e| ProtocolError::Decode(e.to_string()))
        }
        Format::Json => {
            serde_json::from_slice(payload).map_err(|e| ProtocolError::Decode(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_in_both_formats() {
        let req = QueryRequest {
            providers: vec!["desktopapplications".into(), "calc".into()],
            query: "fire".into(),
            maxresults: 5,
            exactsearch: false,
        };

        for format in [Format::Protobuf, Format::Json] {
            let bytes = encode_payload(format, &req).unwrap();
            let back: QueryRequest = decode_payload(format, &bytes).unwrap();
            assert_eq!(back, req, "format {format:?}");
        }
    }

    #[test]
    fn json_payload_tolerates_missing_fields() {
        let req: QueryRequest =
            decode_payload(Format::Json, br#"{"providers":["calc"],"query":"2+2"}"#).unwrap();

        assert_eq!(req.providers, vec!["calc".to_string()]);
        assert_eq!(req.maxresults, 0);
        assert!(!req.exactsearch);
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let err = decode_payload::<QueryRequest>(Format::Json, b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
