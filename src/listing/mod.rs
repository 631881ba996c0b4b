mod loader;

pub use loader::{FileEntry, FileListLoader, FileListing, ListingError};
