pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod palette;
pub mod registry;
pub mod selection;
pub mod session;
pub mod tui;

#[cfg(test)]
pub(crate) mod testutil;
