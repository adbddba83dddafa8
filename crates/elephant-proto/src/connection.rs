//! Connection-side plumbing shared by the daemon and clients.
//!
//! The daemon reads each connection from a single task but writes from
//! many: every frame handler, interval subscription tickers, and async
//! item updates all target the same stream. [`ConnectionWriter`] owns the
//! write half behind a mutex so those frame writes serialize; reads stay
//! with the connection's reader task and never take the lock.

use std::path::Path;
use std::sync::Arc;

use bytes::BytesMut;
use futures::StreamExt;
use prost::Message;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{Encoder, FramedRead};

use crate::error::ProtocolError;
use crate::framing::{
    Format, RequestCodec, RequestFrame, RequestType, ResponseCodec, ResponseFrame, Status,
};
use crate::{encode_payload, messages::Item};

/// Serialized writer for one accepted connection.
#[derive(Debug)]
pub struct ConnectionWriter {
    cid: u32,
    half: Mutex<OwnedWriteHalf>,
}

impl ConnectionWriter {
    #[must_use]
    pub fn new(cid: u32, half: OwnedWriteHalf) -> Self {
        Self {
            cid,
            half: Mutex::new(half),
        }
    }

    /// The connection id assigned on accept.
    #[must_use]
    pub const fn cid(&self) -> u32 {
        self.cid
    }

    /// Write one response frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Io`] when the client is gone; the caller
    /// decides whether that kills a subscription or the whole connection.
    pub async fn write_frame(&self, frame: ResponseFrame) -> Result<(), ProtocolError> {
        let mut buf = BytesMut::new();
        ResponseCodec.encode(frame, &mut buf)?;

        let mut half = self.half.lock().await;
        half.write_all(&buf).await?;
        Ok(())
    }

    /// Write a payload-less status frame such as `Done`.
    ///
    /// # Errors
    ///
    /// See [`write_frame`](Self::write_frame).
    pub async fn write_status(&self, status: Status) -> Result<(), ProtocolError> {
        self.write_frame(ResponseFrame::empty(status)).await
    }

    /// Encode `msg` in `format` and write it under `status`.
    ///
    /// # Errors
    ///
    /// See [`write_frame`](Self::write_frame).
    pub async fn write_message<T>(
        &self,
        status: Status,
        format: Format,
        msg: &T,
    ) -> Result<(), ProtocolError>
    where
        T: Message + Serialize,
    {
        let payload = encode_payload(format, msg)?;
        self.write_frame(ResponseFrame { status, payload }).await
    }

    /// Push a revised item into the connection's open query stream.
    ///
    /// Write failures mean the client already closed and are silently
    /// discarded.
    pub async fn update_item(self: &Arc<Self>, format: Format, item: &Item) {
        if let Err(err) = self.write_message(Status::QueryItem, format, item).await {
            tracing::debug!(cid = self.cid, error = %err, "item update after client close");
        }
    }
}

/// Minimal client used by front-end tooling and the integration tests.
#[derive(Debug)]
pub struct Client {
    reader: FramedRead<OwnedReadHalf, ResponseCodec>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connect to a daemon socket.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Io`] when the socket is absent or refuses.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let stream = UnixStream::connect(socket_path.as_ref()).await?;
        let (read, write) = stream.into_split();

        Ok(Self {
            reader: FramedRead::new(read, ResponseCodec),
            writer: write,
        })
    }

    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns an encode error or the socket write failure.
    pub async fn send<T>(
        &mut self,
        request: RequestType,
        format: Format,
        msg: &T,
    ) -> Result<(), ProtocolError>
    where
        T: Message + Serialize,
    {
        let payload = encode_payload(format, msg)?;
        let mut buf = BytesMut::new();
        RequestCodec.encode(
            RequestFrame {
                request,
                format,
                payload,
            },
            &mut buf,
        )?;
        self.writer.write_all(&buf).await?;
        Ok(())
    }

    /// Send one request with an already-encoded (or deliberately
    /// malformed) payload.
    ///
    /// # Errors
    ///
    /// Returns the socket write failure.
    pub async fn send_raw(
        &mut self,
        request: RequestType,
        format: Format,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        let mut buf = BytesMut::new();
        RequestCodec.encode(
            RequestFrame {
                request,
                format,
                payload: bytes::Bytes::copy_from_slice(payload),
            },
            &mut buf,
        )?;
        self.writer.write_all(&buf).await?;
        Ok(())
    }

    /// Read the next response frame; `None` on EOF.
    pub async fn next_frame(&mut self) -> Option<Result<ResponseFrame, ProtocolError>> {
        self.reader.next().await
    }
}
