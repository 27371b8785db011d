//! WebSocket client for the signaling relay
//!
//! Connects once, announces the sender role, then multiplexes inbound text
//! frames into the bridge and queued outbound messages onto the socket until
//! either side goes away. Reconnecting is left to the caller.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::bridge::SignalingBridge;
use super::message::OutboundMessage;
use crate::error::Result;

/// Run the relay connection to completion
///
/// Returns `Ok(())` when the relay closes the connection or the outbound
/// channel is closed, and an error if the socket fails.
pub async fn run_relay(
    url: &str,
    bridge: Arc<SignalingBridge>,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
) -> Result<()> {
    let (ws_stream, _) = connect_async(url).await?;
    tracing::info!(url, "Connected to signaling relay");

    let (mut write, mut read) = ws_stream.split();

    let hello = OutboundMessage::hello(bridge.config().client_type.clone()).to_json()?;
    write.send(Message::Text(hello)).await?;

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    bridge.handle_text(&text).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Signaling relay closed the connection");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Signaling relay socket error");
                    return Err(e.into());
                }
                None => {
                    tracing::info!("Signaling relay stream ended");
                    return Ok(());
                }
            },

            message = outbound.recv() => match message {
                Some(message) => match message.to_json() {
                    Ok(json) => write.send(Message::Text(json)).await?,
                    Err(e) => {
                        tracing::warn!(target_id = ?message.target(), error = %e, "Outbound message dropped");
                    }
                },
                None => {
                    tracing::info!("Outbound channel closed, leaving signaling relay");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            },
        }
    }
}
