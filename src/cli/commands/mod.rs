pub mod analyze;
pub mod config;
pub mod history;
pub mod init;
pub mod migrate;
