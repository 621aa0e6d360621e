#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use consul_k8s_api as k8s;
pub use consul_k8s_core as core;

mod admission;
mod args;

pub use self::{
    admission::{Admission, Lister},
    args::Args,
};
