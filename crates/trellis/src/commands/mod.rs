//! Command implementations that run outside an initialized repository.

pub mod init;
