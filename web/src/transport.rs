use futures_channel::mpsc;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use gloo::net::websocket::Message;
use gloo::net::websocket::futures::WebSocket;
use mines_core::{MinesTable, Transport, TransportError};
use std::rc::Weak;
use wasm_bindgen_futures::spawn_local;

/// Incoming half of the socket, handed to [`read_frames`] once the table exists.
pub(crate) type Incoming = SplitStream<WebSocket>;

/// WebSocket link to the table server.
///
/// Frames are queued and written by a task in order, so sending never blocks.
pub(crate) struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<String>,
}

impl WebSocketTransport {
    pub(crate) fn open(url: &str) -> Result<(Self, Incoming), TransportError> {
        let socket = WebSocket::open(url).map_err(|err| TransportError::Send(err.to_string()))?;
        log::info!("Connecting to {url}");
        let (mut sink, incoming) = socket.split();
        let (outgoing, mut queue) = mpsc::unbounded::<String>();

        spawn_local(async move {
            while let Some(frame) = queue.next().await {
                log::trace!("ws -> {frame}");
                if let Err(err) = sink.send(Message::Text(frame)).await {
                    log::error!("WebSocket write failed: {err}");
                    break;
                }
            }
            log::debug!("WebSocket writer stopped");
        });

        Ok((Self { outgoing }, incoming))
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outgoing
            .unbounded_send(frame)
            .map_err(|_| TransportError::Closed)
    }
}

/// Feeds every text frame to `table` until the socket closes, then fails
/// whatever is still waiting for an answer.
pub(crate) async fn read_frames(mut incoming: Incoming, table: Weak<MinesTable>) {
    while let Some(message) = incoming.next().await {
        let Some(table) = table.upgrade() else {
            return;
        };
        match message {
            Ok(Message::Text(text)) => {
                log::trace!("ws <- {text}");
                table.handle_incoming(&text);
            }
            Ok(Message::Bytes(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => table.handle_incoming(&text),
                Err(err) => log::warn!("Dropping binary frame: {err}"),
            },
            Err(err) => {
                log::error!("WebSocket read failed: {err}");
                break;
            }
        }
    }
    if let Some(table) = table.upgrade() {
        table.connection_lost();
    }
}
