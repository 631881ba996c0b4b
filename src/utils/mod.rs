pub mod progress;

pub use progress::{format_bytes, format_percentage, progress_bar};
