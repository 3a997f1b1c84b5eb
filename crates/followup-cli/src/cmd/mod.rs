pub mod config;
pub mod init;
pub mod order;
pub mod run;
pub mod state;
