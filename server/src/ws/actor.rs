use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol::{parse_client_event, ClientEvent, PayloadError, ServerEvent};
use crate::ws::session::{CloseReason, Session};
use crate::ws::UserId;

/// Close code for a peer that stopped answering pings.
const CLOSE_GOING_AWAY: u16 = 1001;

/// How the writer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterExit {
    /// Sent a Close frame on the server's behalf (supersession, heartbeat)
    SentClose,
    SinkFailed,
    ChannelClosed,
}

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// - Writer task: owns the sink, forwards frames from the session's channel.
///   Stops after forwarding a Close frame, which is how a supersession or a
///   heartbeat timeout tears the connection down.
/// - Heartbeat task: periodic pings, closes on missing pong.
/// - Reader loop (this task): processes inbound frames in arrival order.
///
/// Whichever side finishes first ends the session; dropping the session
/// removes it from the presence registry.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: UserId) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let session = Session::activate(state.router.registry(), user_id, tx.clone());

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let heartbeat_handle = tokio::spawn(heartbeat_task(
        tx.clone(),
        pong_rx,
        state.settings.ping_interval,
        state.settings.pong_timeout,
    ));

    let reason = tokio::select! {
        reason = reader_loop(&mut ws_receiver, &session, &state, &pong_tx) => reason,
        exit = &mut writer_handle => match exit {
            Ok(WriterExit::SentClose) => CloseReason::ServerClosed,
            Ok(WriterExit::SinkFailed) | Ok(WriterExit::ChannelClosed) | Err(_) => CloseReason::WriterFailed,
        },
    };

    writer_handle.abort();
    heartbeat_handle.abort();
    session.close(reason);
}

async fn reader_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    session: &Session,
    state: &AppState,
    pong_tx: &mpsc::UnboundedSender<()>,
) -> CloseReason {
    let handle = session.handle();

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => match parse_client_event(text.as_str()) {
                    Ok(ClientEvent::SendMessage(request)) => {
                        state.router.route(handle, request);
                    }
                    Ok(ClientEvent::Authenticate { .. }) => {
                        tracing::debug!(user_id = %session.user_id(), "Ignoring authenticate on active session");
                    }
                    Err(err) => reply_malformed(session, err),
                },
                Message::Binary(_) => reply_malformed(session, PayloadError::Binary),
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = handle.send_raw(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %session.user_id(),
                        reason = ?frame,
                        "Client initiated close"
                    );
                    return CloseReason::ClientClosed;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %session.user_id(),
                    error = %e,
                    "WebSocket receive error"
                );
                return CloseReason::TransportError;
            }
            None => {
                tracing::info!(user_id = %session.user_id(), "WebSocket stream ended");
                return CloseReason::ClientClosed;
            }
        }
    }
}

/// Drop the frame, keep the connection, tell the sender what was wrong.
fn reply_malformed(session: &Session, err: PayloadError) {
    tracing::debug!(
        user_id = %session.user_id(),
        error = %err,
        "Dropping malformed frame"
    );
    let event: ServerEvent = err.to_event();
    let _ = session.handle().push(&event);
}

/// Writer task: receives frames from the channel and forwards them to the sink.
async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) -> WriterExit {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            return WriterExit::SinkFailed;
        }
        if is_close {
            return WriterExit::SentClose;
        }
    }
    WriterExit::ChannelClosed
}

/// Heartbeat: ping every `ping_interval`, close if no pong within `pong_timeout`.
async fn heartbeat_task(
    tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    ping_interval: std::time::Duration,
    pong_timeout: std::time::Duration,
) {
    let mut ping_timer = interval(ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        // Unsolicited or late pongs must not answer this ping
        while pong_rx.try_recv().is_ok() {}

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            break;
        }

        match timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unsolicited_pong_does_not_answer_next_ping() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();

        // Pong arrives before any ping was sent
        pong_tx.send(()).unwrap();

        let heartbeat = tokio::spawn(heartbeat_task(
            tx,
            pong_rx,
            Duration::from_millis(50),
            Duration::from_millis(50),
        ));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(matches!(first, Some(Message::Ping(_))));

        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        match second {
            Some(Message::Close(Some(frame))) => assert_eq!(frame.code, CLOSE_GOING_AWAY),
            other => panic!("Expected close after unanswered ping, got: {:?}", other),
        }

        heartbeat.await.unwrap();
    }

    #[tokio::test]
    async fn test_answered_ping_keeps_connection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();

        let heartbeat = tokio::spawn(heartbeat_task(
            tx,
            pong_rx,
            Duration::from_millis(50),
            Duration::from_millis(200),
        ));

        for _ in 0..3 {
            let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
            assert!(matches!(msg, Some(Message::Ping(_))));
            pong_tx.send(()).unwrap();
        }

        heartbeat.abort();
    }
}
