//! Infrastructure layer: document stores and the application services over them.

pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;
