use crate::control::control_error::ControlError;
use crate::media::FrameProducer;
use depthcast_core::{ControlCommand, ControlResponse, DecodeError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Applies control commands to the shared streaming parameters.
///
/// Stateless apart from its handles, so one dispatcher serves every session;
/// per-session ordering comes from each session feeding it sequentially.
#[derive(Clone)]
pub struct ControlDispatcher {
    producer: Arc<FrameProducer>,
}

impl ControlDispatcher {
    pub fn new(producer: Arc<FrameProducer>) -> Self {
        Self { producer }
    }

    /// Decodes and applies one raw control message. Undecodable input yields
    /// no response at all; anything that parses gets exactly one.
    pub async fn handle_message(&self, raw: &[u8]) -> Option<ControlResponse> {
        match ControlCommand::decode(raw) {
            Ok(command) => Some(self.handle_command(command).await),
            Err(DecodeError::Malformed(e)) => {
                warn!("Dropping malformed control message: {}", e);
                None
            }
            Err(e) => {
                warn!("Rejected control message: {}", e);
                Some(ControlResponse::error(e.kind(), e.to_string()))
            }
        }
    }

    /// Never panics and never returns without a response.
    pub async fn handle_command(&self, command: ControlCommand) -> ControlResponse {
        let kind = command.kind();
        match AssertUnwindSafe(self.apply(command)).catch_unwind().await {
            Ok(Ok(message)) => {
                info!("{}", message);
                ControlResponse::ack(kind, message)
            }
            Ok(Err(e)) => {
                warn!("{} failed: {}", kind, e);
                ControlResponse::error(kind, e.to_string())
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                error!("{} panicked: {}", kind, cause);
                ControlResponse::error(kind, format!("Internal error: {}", cause))
            }
        }
    }

    async fn apply(&self, command: ControlCommand) -> Result<String, ControlError> {
        let params = self.producer.params();
        match command {
            ControlCommand::SetRange { max_distance } => {
                let requested = u32::try_from(max_distance).map_err(|_| {
                    ControlError::InvalidValue {
                        field: "max_distance",
                        value: max_distance,
                    }
                })?;
                let applied = self.producer.set_range(requested).await?;
                params.set_max_distance(applied);
                Ok(format!("Range set to {}", applied))
            }
            ControlCommand::SetConfidence { threshold } => {
                let applied = params.set_confidence_threshold(threshold);
                Ok(format!("Confidence threshold set to {}", applied))
            }
            ControlCommand::SetColormap { name } => {
                let colormap = params.set_colormap(&name)?;
                Ok(format!("Colormap set to {}", colormap))
            }
            ControlCommand::SetFpsLimit { fps } => {
                let applied = self.producer.set_fps_limit(fps);
                Ok(format!("FPS limit set to {}", applied))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
