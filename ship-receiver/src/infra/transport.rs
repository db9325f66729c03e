// This file is part of ship-receiver.
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transport (C1): a binary websocket client to the upstream state-history feed (`spec.md`
//! §4.1). DNS resolution, TCP connect and the websocket handshake are a single atomic step with
//! `tokio-tungstenite`, so the Resolving/Connecting/Handshaking states the Sync Controller
//! tracks (`spec.md` §4.4) collapse into one [Transport::connect] call here; see `DESIGN.md`.

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config,
    tungstenite::{Message, protocol::WebSocketConfig},
};

/// The upstream imposes no smaller cap than this on an inbound message (`spec.md` §4.1); the
/// core must not impose one either.
const MAX_MESSAGE_SIZE: usize = 1 << 36;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// The Transport (C1) contract: binary websocket connect/handshake/send/read/close, with all I/O
/// reported as a single opaque [TransportError] (`spec.md` §4.1).
#[trait_variant::make(Send)]
pub trait Transport
where
    Self: Sized + Send + 'static,
{
    /// Resolves `host:port`, connects, and performs the websocket handshake at path `/`
    /// (`spec.md` §6).
    async fn connect(host: &str, port: &str) -> Result<Self, TransportError>;

    /// Reads the next inbound frame as an opaque byte blob.
    async fn read(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Sends `bytes` as a single outgoing binary frame.
    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Attempts a graceful close (normal close code); never fails user-visibly (`spec.md` §4.1).
    async fn close(&mut self);
}

/// The production [Transport], backed by `tokio-tungstenite`.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl Transport for WebSocketTransport {
    async fn connect(host: &str, port: &str) -> Result<Self, TransportError> {
        let url = format!("ws://{host}:{port}/");

        let config = WebSocketConfig::default()
            .max_message_size(Some(MAX_MESSAGE_SIZE))
            .max_frame_size(Some(MAX_MESSAGE_SIZE));

        let (stream, _response) = connect_async_with_config(&url, Some(config), false)
            .await
            .map_err(|error| TransportError(error.to_string()))?;

        Ok(Self { stream })
    }

    async fn read(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(data.into()),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Text(_))) => {
                    return Err(TransportError("unexpected text frame from SHiP".to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(TransportError(format!("connection closed by peer: {frame:?}")));
                }
                Some(Err(error)) => return Err(TransportError(error.to_string())),
                None => return Err(TransportError("connection closed".to_string())),
            }
        }
    }

    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.stream
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|error| TransportError(error.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
