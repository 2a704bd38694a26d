#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]

pub mod address;
pub mod balance;
pub mod config;
pub mod delegate;
pub mod envelope;
pub mod fees;
pub mod history;
pub mod host;
pub mod identity;
pub mod intent;
pub mod primitives;
pub mod provider;
pub mod repository;
pub mod tracing;
pub mod vtxo;
