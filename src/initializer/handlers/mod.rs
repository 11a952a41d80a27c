//! Built-in initializers for known OS families

mod linux;
mod mac;

pub use linux::LinuxInitializer;
pub use mac::MacInitializer;
