pub mod documents;
pub mod load;
pub mod memory;
pub mod merge;
pub mod session;
pub mod session_files;
