#![allow(async_fn_in_trait)]

pub mod comm;
pub mod config;
pub mod drivers;
pub mod error;
pub mod state;
pub mod tasks;
pub mod timing;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, Result};
