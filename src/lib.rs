pub mod batch;
pub mod compose;
pub mod config;
pub mod cross_env;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipeline;
pub mod quirks;
pub mod registry;
pub mod tool_config;
pub mod ui;

#[cfg(test)]
pub(crate) mod testutil;
