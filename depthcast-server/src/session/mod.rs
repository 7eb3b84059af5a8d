mod control_loop;
mod negotiation;
mod peer_session;
mod session_command;
mod session_manager;
mod session_state;

pub use control_loop::*;
pub use peer_session::*;
pub use session_command::*;
pub use session_manager::*;
pub use session_state::*;
