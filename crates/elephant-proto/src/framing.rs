//! Length-prefixed frame codecs.
//!
//! [`RequestCodec`] is what the daemon reads with and clients write with;
//! [`ResponseCodec`] is the opposite direction. Both validate the declared
//! payload length against [`MAX_FRAME_SIZE`] before allocating, and both
//! are stateless: payload bytes pass through untouched.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{MAX_FRAME_SIZE, ProtocolError};

/// Request type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestType {
    Query = 0,
    Activate = 1,
    Subscribe = 2,
    MenuNotify = 3,
    ProviderState = 4,
}

impl TryFrom<u8> for RequestType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::Query),
            1 => Ok(Self::Activate),
            2 => Ok(Self::Subscribe),
            3 => Ok(Self::MenuNotify),
            4 => Ok(Self::ProviderState),
            other => Err(ProtocolError::UnknownRequest(other)),
        }
    }
}

/// Payload wire format, chosen per request and inherited by every
/// response on that exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Format {
    Protobuf = 0,
    Json = 1,
}

impl TryFrom<u8> for Format {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::Protobuf),
            1 => Ok(Self::Json),
            other => Err(ProtocolError::UnknownFormat(other)),
        }
    }
}

/// Response status byte.
///
/// `230` is reserved for [`Done`](Status::Done).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    QueryItem = 0,
    QueryItemEmpty = 1,
    ActivationFinished = 2,
    StateItem = 3,
    Done = 230,
    EndOfStream = 253,
}

impl Status {
    /// Status of a subscription update frame. Shares the value of
    /// [`QueryItem`](Status::QueryItem).
    pub const SUBSCRIPTION_UPDATE: Self = Self::QueryItem;
}

impl TryFrom<u8> for Status {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::QueryItem),
            1 => Ok(Self::QueryItemEmpty),
            2 => Ok(Self::ActivationFinished),
            3 => Ok(Self::StateItem),
            230 => Ok(Self::Done),
            253 => Ok(Self::EndOfStream),
            other => Err(ProtocolError::Decode(format!("unknown status {other}"))),
        }
    }
}

/// One decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub request: RequestType,
    pub format: Format,
    pub payload: Bytes,
}

/// One response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub status: Status,
    pub payload: Bytes,
}

impl ResponseFrame {
    /// A payload-less frame, e.g. `Done` or `ActivationFinished`.
    #[must_use]
    pub const fn empty(status: Status) -> Self {
        Self {
            status,
            payload: Bytes::new(),
        }
    }
}

const REQUEST_HEADER_LEN: usize = 6;
const RESPONSE_HEADER_LEN: usize = 5;

fn check_length(length: usize) -> Result<(), ProtocolError> {
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { length });
    }
    Ok(())
}

/// Codec for the client-to-daemon direction.
#[derive(Debug, Default)]
pub struct RequestCodec;

impl Decoder for RequestCodec {
    type Item = RequestFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RequestFrame>, ProtocolError> {
        if src.len() < REQUEST_HEADER_LEN {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize;
        check_length(length)?;

        if src.len() < REQUEST_HEADER_LEN + length {
            src.reserve(REQUEST_HEADER_LEN + length - src.len());
            return Ok(None);
        }

        let request = RequestType::try_from(src[0])?;
        let format = Format::try_from(src[1])?;
        src.advance(REQUEST_HEADER_LEN);
        let payload = src.split_to(length).freeze();

        Ok(Some(RequestFrame {
            request,
            format,
            payload,
        }))
    }
}

impl Encoder<RequestFrame> for RequestCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: RequestFrame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        check_length(frame.payload.len())?;

        dst.reserve(REQUEST_HEADER_LEN + frame.payload.len());
        dst.put_u8(frame.request as u8);
        dst.put_u8(frame.format as u8);
        dst.put_u32(frame.payload.len() as u32);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

/// Codec for the daemon-to-client direction.
#[derive(Debug, Default)]
pub struct ResponseCodec;

impl Decoder for ResponseCodec {
    type Item = ResponseFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ResponseFrame>, ProtocolError> {
        if src.len() < RESPONSE_HEADER_LEN {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        check_length(length)?;

        if src.len() < RESPONSE_HEADER_LEN + length {
            src.reserve(RESPONSE_HEADER_LEN + length - src.len());
            return Ok(None);
        }

        let status = Status::try_from(src[0])?;
        src.advance(RESPONSE_HEADER_LEN);
        let payload = src.split_to(length).freeze();

        Ok(Some(ResponseFrame { status, payload }))
    }
}

impl Encoder<ResponseFrame> for ResponseCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: ResponseFrame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        check_length(frame.payload.len())?;

        dst.reserve(RESPONSE_HEADER_LEN + frame.payload.len());
        dst.put_u8(frame.status as u8);
        dst.put_u32(frame.payload.len() as u32);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}
