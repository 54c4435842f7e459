use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::types::Update;

/// Which push transport is carrying updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    ServerSentEvents,
}

/// Connection lifecycle of the realtime channel. The WebSocket transport is
/// always tried first; SSE is the in-cycle fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    ConnectingPrimary,
    ConnectingSecondary,
    Connected(Transport),
    Reconnecting,
}

#[derive(Debug, Error)]
enum RealtimeError {
    #[error("WebSocket connect to {url} failed: {message}")]
    WebSocket { url: String, message: String },

    #[error("SSE connect to {url} failed: {message}")]
    Sse { url: String, message: String },

    #[error("connect to {url} timed out")]
    Timeout { url: String },
}

/// Receives updates parsed off the push channel.
#[async_trait]
pub(crate) trait PushHandler: Send + Sync {
    async fn handle(&self, update: Update);
}

#[derive(Debug, Clone)]
pub(crate) struct RealtimeOptions {
    pub ws_url: String,
    pub sse_url: String,
    pub api_key: String,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Drive the channel until `token` is cancelled: connect (primary, then
/// secondary), pump messages, and reconnect after a fixed delay whenever the
/// active transport drops.
pub(crate) async fn run_channel(
    options: RealtimeOptions,
    states: watch::Sender<ChannelState>,
    token: CancellationToken,
    handler: Arc<dyn PushHandler>,
) {
    while !token.is_cancelled() {
        let _ = states.send(ChannelState::ConnectingPrimary);
        match connect_websocket(&options).await {
            Ok(stream) => {
                info!("realtime updates connected via WebSocket");
                let _ = states.send(ChannelState::Connected(Transport::WebSocket));
                read_websocket(stream, handler.as_ref(), &token).await;
            }
            Err(error) => {
                warn!("{error}, trying SSE transport");
                let _ = states.send(ChannelState::ConnectingSecondary);
                match connect_sse(&options).await {
                    Ok(response) => {
                        info!("realtime updates connected via SSE");
                        let _ =
                            states.send(ChannelState::Connected(Transport::ServerSentEvents));
                        read_sse(response, handler.as_ref(), &token).await;
                    }
                    Err(error) => warn!("{error}"),
                }
            }
        }

        if token.is_cancelled() {
            break;
        }
        let _ = states.send(ChannelState::Reconnecting);
        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(options.reconnect_delay) => {}
        }
    }

    let _ = states.send(ChannelState::Disconnected);
}

async fn connect_websocket(options: &RealtimeOptions) -> Result<WsStream, RealtimeError> {
    let url = format!("{}?apiKey={}", options.ws_url, options.api_key);

    match tokio::time::timeout(
        options.connect_timeout,
        tokio_tungstenite::connect_async(url.clone()),
    )
    .await
    {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(error)) => Err(RealtimeError::WebSocket {
            url,
            message: error.to_string(),
        }),
        Err(_) => Err(RealtimeError::Timeout { url }),
    }
}

async fn read_websocket(mut stream: WsStream, handler: &dyn PushHandler, token: &CancellationToken) {
    loop {
        tokio::select! {
            () = token.cancelled() => return,
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => dispatch(text.as_str(), handler).await,
                Some(Ok(Message::Close(_))) | None => {
                    info!("realtime WebSocket closed by peer");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!("realtime WebSocket error: {error}");
                    return;
                }
            }
        }
    }
}

async fn connect_sse(options: &RealtimeOptions) -> Result<reqwest::Response, RealtimeError> {
    let sse_error = |message: String| RealtimeError::Sse {
        url: options.sse_url.clone(),
        message,
    };

    let client = reqwest::Client::builder()
        .connect_timeout(options.connect_timeout)
        .user_agent(options.user_agent.clone())
        .build()
        .map_err(|error| sse_error(error.to_string()))?;

    let response = client
        .get(&options.sse_url)
        .query(&[("apiKey", options.api_key.as_str())])
        .header("Accept", "text/event-stream")
        .send()
        .await
        .map_err(|error| sse_error(error.to_string()))?;

    if !response.status().is_success() {
        return Err(sse_error(format!("HTTP {}", response.status())));
    }
    Ok(response)
}

async fn read_sse(response: reqwest::Response, handler: &dyn PushHandler, token: &CancellationToken) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    loop {
        tokio::select! {
            () = token.cancelled() => return,
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for frame in drain_sse_frames(&mut buffer) {
                        dispatch(&frame, handler).await;
                    }
                }
                Some(Err(error)) => {
                    warn!("realtime SSE stream error: {error}");
                    return;
                }
                None => {
                    info!("realtime SSE stream closed by peer");
                    return;
                }
            }
        }
    }
}

/// Extract the `data` payloads of every complete SSE frame in `buffer`,
/// leaving any trailing partial frame in place for the next chunk.
pub(crate) fn drain_sse_frames(buffer: &mut String) -> Vec<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace('\r', "");
    }

    let mut frames = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let frame = buffer[..pos].to_string();
        buffer.drain(..pos + 2);

        let mut data_lines = Vec::new();
        for line in frame.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                data_lines.push(data.strip_prefix(' ').unwrap_or(data));
            }
        }
        if !data_lines.is_empty() {
            frames.push(data_lines.join("\n"));
        }
    }
    frames
}

async fn dispatch(raw: &str, handler: &dyn PushHandler) {
    if let Some(update) = parse_push_update(raw) {
        debug!("realtime update {} received", update.version);
        handler.handle(update).await;
    }
}

/// Parse one push message. Malformed messages are dropped without touching
/// the connection.
pub(crate) fn parse_push_update(raw: &str) -> Option<Update> {
    match serde_json::from_str(raw) {
        Ok(update) => Some(update),
        Err(error) => {
            warn!("dropping malformed push message: {error}");
            None
        }
    }
}
