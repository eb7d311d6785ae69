pub mod controller;
pub mod sink;

pub use controller::{PlaybackController, PlaybackEvent};
pub use sink::{NullSink, PlaybackCancel, PlaybackHandle, PlaybackSink, RodioSink};
