mod config;
mod control;
mod media;
mod session;
mod signaling;
mod transport;

pub use config::*;
pub use control::*;
pub use media::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
