pub mod events;
pub mod registry;
pub mod relay;

pub use events::{ClientEvent, IceServer, Participant, ServerEvent};
pub use registry::ConnectionRegistry;
pub use relay::{SignalSink, SignalingRelay};
