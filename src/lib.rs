// Library exports for testing
pub mod capture_buffer;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod device;
pub mod dump;
pub mod error;
pub mod frame;
pub mod hotkey;
pub mod protocol;
pub mod recognizer;
pub mod session;
pub mod sink;
pub mod transcript;
