mod signaling_output;
mod signaling_router;
mod ws_handler;

pub use signaling_output::*;
pub use signaling_router::*;
pub use ws_handler::*;
