//! Process spawning for the session manager.

pub mod process;
