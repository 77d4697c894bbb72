pub mod classifier;
pub mod outcome;
pub mod recorder;
pub mod window;

pub use classifier::classify_span;
pub use recorder::SessionRecorder;
pub use window::{current_window, generate_windows, next_windows, SessionWindow};
