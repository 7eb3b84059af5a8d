mod depth_source;
mod fps_counter;
mod frame;
mod frame_producer;
mod frame_renderer;
mod runtime_params;
mod synthetic_source;

pub use depth_source::*;
pub use fps_counter::*;
pub use frame::*;
pub use frame_producer::*;
pub use frame_renderer::*;
pub use runtime_params::*;
pub use synthetic_source::*;
