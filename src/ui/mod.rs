pub mod icons;
pub mod progress;
pub mod sink;

pub use progress::{BatchProgress, BatchUI};
pub use sink::{ConsoleSink, OutputSink};
