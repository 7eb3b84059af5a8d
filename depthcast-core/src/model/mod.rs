mod client;
mod colormap;
mod control;
mod room;
mod signaling;

pub use client::ClientId;
pub use colormap::{Colormap, UnknownColormap};
pub use control::{CommandKind, ControlCommand, ControlResponse, DecodeError, ResponseOutcome};
pub use room::RoomId;
pub use signaling::SignalMessage;
