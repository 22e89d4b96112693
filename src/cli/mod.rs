pub mod app;
pub mod commands;
pub mod context;
pub mod deliver;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod pending;
pub mod runtime;
pub mod send;
pub mod sites;
pub mod templates;
pub mod watch;

pub use app::run;
pub use output::OutputFormat;
