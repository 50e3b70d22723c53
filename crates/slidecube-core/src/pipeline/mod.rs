pub mod composite;
pub mod export;
pub mod layout;
pub mod montage;
pub mod progress;
pub mod zstack;

pub use layout::RunLayout;
pub use progress::{NoOpReporter, ProgressReporter};
