// WebSocket transport for the message bus (tokio-tungstenite).
//
// The sync client is single-threaded and event-driven; this transport owns
// a current-thread runtime and drives the socket to completion per call.
// Frames that don't decode as a known event are dropped (the protocol is
// forward-compatible), control frames are handled by tungstenite.

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use livedraft_common::protocol::bus::BusMessage;

use crate::connection::BusTransport;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production `BusTransport` over a WebSocket.
pub struct WsTransport {
    runtime: tokio::runtime::Runtime,
    stream: Option<WsStream>,
}

impl WsTransport {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build transport runtime")?;
        Ok(Self { runtime, stream: None })
    }
}

impl BusTransport for WsTransport {
    fn connect(&mut self, bus_url: &str) -> Result<()> {
        let (stream, _response) = self
            .runtime
            .block_on(connect_async(bus_url))
            .with_context(|| format!("WebSocket connection to `{bus_url}` failed"))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn send(&mut self, msg: &BusMessage) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(|| anyhow!("transport is not connected"))?;
        let text = serde_json::to_string(msg).context("failed to encode bus message")?;
        self.runtime.block_on(stream.send(Message::text(text))).context("WebSocket send failed")
    }

    fn recv(&mut self) -> Result<Option<BusMessage>> {
        let stream = self.stream.as_mut().ok_or_else(|| anyhow!("transport is not connected"))?;
        loop {
            let Some(frame) = self.runtime.block_on(stream.next()) else {
                return Ok(None);
            };
            match frame.context("WebSocket receive failed")? {
                Message::Text(text) => match serde_json::from_str::<BusMessage>(text.as_str()) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(error) => {
                        debug!(%error, "dropping undecodable bus frame");
                    }
                },
                Message::Close(_) => return Ok(None),
                // Binary frames are not part of this protocol; ping/pong is
                // answered by tungstenite itself.
                _ => {}
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = self.runtime.block_on(stream.close(None));
        }
    }
}
