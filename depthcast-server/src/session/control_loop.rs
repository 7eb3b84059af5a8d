use crate::control::ControlDispatcher;
use crate::transport::ControlChannelHandle;
use depthcast_core::ClientId;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Label of the data channel carrying control commands.
pub const CONTROL_CHANNEL_LABEL: &str = "controls";

/// Handles one session's control messages strictly in arrival order,
/// replying on the same channel.
pub async fn run_control_loop(
    client_id: ClientId,
    mut handle: ControlChannelHandle,
    dispatcher: ControlDispatcher,
) {
    while let Some(raw) = handle.inbound.recv().await {
        let Some(response) = dispatcher.handle_message(&raw).await else {
            continue;
        };

        let text = match serde_json::to_string(&response) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize control response: {}", e);
                continue;
            }
        };

        if let Err(e) = handle.channel.send_text(text).await {
            warn!("Control reply to {} not delivered: {:#}", client_id, e);
        }
    }
    debug!("Control channel for {} closed", client_id);
}

/// Serves every channel the client opens on its own, each through its own
/// [`run_control_loop`] so replies go back on the channel they came in on.
/// Aborting this task stops all of them.
pub async fn serve_incoming_channels(
    client_id: ClientId,
    mut incoming: mpsc::Receiver<ControlChannelHandle>,
    dispatcher: ControlDispatcher,
) {
    let mut loops = JoinSet::new();
    while let Some(handle) = incoming.recv().await {
        info!(
            "Serving control commands from {} on '{}'",
            client_id,
            handle.channel.label()
        );
        loops.spawn(run_control_loop(client_id, handle, dispatcher.clone()));
    }
    while loops.join_next().await.is_some() {}
}
