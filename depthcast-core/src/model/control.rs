use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A runtime parameter change requested over a session's control channel.
///
/// Wire form: `{"type": "set_colormap", "payload": {"colormap": "JET"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlCommand {
    SetRange {
        max_distance: i64,
    },
    #[serde(rename = "set_confidence_threshold")]
    SetConfidence {
        threshold: i64,
    },
    SetColormap {
        #[serde(rename = "colormap")]
        name: String,
    },
    SetFpsLimit {
        fps: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    SetRange,
    SetConfidenceThreshold,
    SetColormap,
    SetFpsLimit,
    Unknown,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::SetRange => "set_range",
            CommandKind::SetConfidenceThreshold => "set_confidence_threshold",
            CommandKind::SetColormap => "set_colormap",
            CommandKind::SetFpsLimit => "set_fps_limit",
            CommandKind::Unknown => "unknown",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "set_range" => CommandKind::SetRange,
            "set_confidence_threshold" => CommandKind::SetConfidenceThreshold,
            "set_colormap" => CommandKind::SetColormap,
            "set_fps_limit" => CommandKind::SetFpsLimit,
            _ => CommandKind::Unknown,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown command type: {0}")]
    UnknownType(String),

    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: CommandKind, reason: String },
}

impl DecodeError {
    pub fn kind(&self) -> CommandKind {
        match self {
            DecodeError::InvalidPayload { kind, .. } => *kind,
            _ => CommandKind::Unknown,
        }
    }
}

impl ControlCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            ControlCommand::SetRange { .. } => CommandKind::SetRange,
            ControlCommand::SetConfidence { .. } => CommandKind::SetConfidenceThreshold,
            ControlCommand::SetColormap { .. } => CommandKind::SetColormap,
            ControlCommand::SetFpsLimit { .. } => CommandKind::SetFpsLimit,
        }
    }

    /// Decodes one control-channel message, separating undecodable input from
    /// well-formed messages that name an unknown command or carry a bad payload.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(raw)?;

        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let kind = CommandKind::from_tag(&tag);
        if kind == CommandKind::Unknown {
            return Err(DecodeError::UnknownType(tag));
        }

        serde_json::from_value(value).map_err(|e| DecodeError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        // Every variant is a plain struct of integers and strings.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Ack,
    Error,
}

/// Reply to exactly one control message, sent back on the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    #[serde(rename = "type")]
    pub outcome: ResponseOutcome,
    pub command_type: CommandKind,
    pub message: String,
}

impl ControlResponse {
    pub fn ack(command_type: CommandKind, message: impl Into<String>) -> Self {
        Self {
            outcome: ResponseOutcome::Ack,
            command_type,
            message: message.into(),
        }
    }

    pub fn error(command_type: CommandKind, message: impl Into<String>) -> Self {
        Self {
            outcome: ResponseOutcome::Error,
            command_type,
            message: message.into(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.outcome == ResponseOutcome::Ack
    }
}
