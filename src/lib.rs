//! Library crate for survaive-back, exposing modules for binaries and integration tests.

pub mod config;
pub mod dao;
mod dto;
pub mod error;
pub mod providers;
pub mod routes;
pub mod services;
pub mod state;
#[cfg(test)]
mod test_support;
