//! Incremental sync: collaborator ports and window logic

pub mod ports;
pub mod window;
