pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod review;
pub mod state;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;
