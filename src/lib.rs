#![allow(async_fn_in_trait)]
pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod pipeline;
pub mod postgres;
pub mod s3;
pub mod secrets;
pub mod sentinel_hub;
pub mod transport;
pub mod window;

#[cfg(test)]
mod testing;
