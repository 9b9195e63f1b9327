pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod run;
pub mod runtime;
pub mod summary;
pub mod validate;

pub use commands::Commands;
pub use env::CliArgs;
