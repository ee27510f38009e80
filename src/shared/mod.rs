pub mod fs_atomic;
pub mod logging;
pub mod state_paths;
pub mod time;
