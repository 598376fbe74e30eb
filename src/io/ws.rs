use std::io;
use std::net::TcpStream;
use std::time::Duration;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket, connect};

use super::push::{PushConnection, PushError, PushTransport};

/// `{ws_base}/ws/boards/{board_id}`
pub fn board_stream_url(ws_base: &str, board_id: &str) -> String {
    format!("{}/ws/boards/{}", ws_base.trim_end_matches('/'), board_id)
}

/// WebSocket change stream
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    read_timeout: Duration,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, read_timeout: Duration) -> Self {
        WsTransport {
            url: url.into(),
            read_timeout,
        }
    }
}

impl PushTransport for WsTransport {
    type Conn = WsConnection;

    fn connect(&mut self) -> Result<WsConnection, PushError> {
        let (mut socket, _response) =
            connect(self.url.as_str()).map_err(|e| PushError::Connect(e.to_string()))?;
        match socket.get_mut() {
            MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(self.read_timeout))?,
            MaybeTlsStream::Rustls(stream) => stream.sock.set_read_timeout(Some(self.read_timeout))?,
            _ => {}
        }
        Ok(WsConnection { socket })
    }
}

pub struct WsConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl PushConnection for WsConnection {
    fn recv(&mut self) -> Result<Option<String>, PushError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(text.as_str().to_string())),
            Ok(Message::Close(_)) => Err(PushError::Closed),
            // Ping replies are queued by tungstenite itself
            Ok(_) => Ok(None),
            Err(WsError::Io(error))
                if matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Err(PushError::Closed),
            Err(WsError::Io(error)) => Err(PushError::Io(error)),
            Err(e) => Err(PushError::Protocol(e.to_string())),
        }
    }

    fn send_text(&mut self, text: &str) -> Result<(), PushError> {
        self.socket
            .send(Message::text(text.to_string()))
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => PushError::Closed,
                other => PushError::Protocol(other.to_string()),
            })
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_stream_url() {
        assert_eq!(board_stream_url("ws://localhost:8000", "b1"), "ws://localhost:8000/ws/boards/b1");
        assert_eq!(board_stream_url("wss://x.io/", "42"), "wss://x.io/ws/boards/42");
    }

    #[test]
    fn test_connect_refused() {
        let mut transport = WsTransport::new("ws://127.0.0.1:1/ws/boards/b1", Duration::from_millis(50));
        assert!(matches!(transport.connect(), Err(PushError::Connect(_))));
    }

    #[test]
    fn test_connect_refused_over_tls() {
        let mut transport = WsTransport::new("wss://127.0.0.1:1/ws/boards/b1", Duration::from_millis(50));
        match transport.connect() {
            Err(PushError::Connect(msg)) => assert!(!msg.contains("TLS support not compiled"), "{msg}"),
            Err(other) => panic!("expected connect error, got {other:?}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
