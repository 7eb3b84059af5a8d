mod control_dispatcher;
mod control_error;

pub use control_dispatcher::*;
pub use control_error::*;
