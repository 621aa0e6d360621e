#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Consul's config-entry data model, as read from and written to Consul's
//! HTTP API.

pub mod common;
pub mod duration;
mod entry;
pub mod exported;
pub mod filter;
pub mod gateway;
pub mod intentions;
pub mod jwt;
pub mod mesh;
pub mod namespace;
pub mod proxy;
pub mod rate_limit;
pub mod resolver;
pub mod router;
pub mod sameness;
pub mod service;
pub mod splitter;

pub use self::{
    common::{EntryMeta, Meta},
    duration::GoDuration,
    entry::*,
};
