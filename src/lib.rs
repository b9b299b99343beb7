#![warn(rust_2018_idioms)]
#![warn(clippy::dbg_macro, clippy::print_stdout)]
#![doc = include_str!("../README.md")]

mod chunk;
pub mod client;
mod error;
mod id;
mod meta;
pub mod multipart;
pub mod params;
pub mod pool;
pub mod request;
pub mod response;
pub mod stream;

pub use crate::{
    client::Engine,
    error::*,
    meta::{ProtocolStatus, Role},
    params::Params,
    pool::{ConnectionPool, TcpConnectionPool},
    request::RequestHandle,
    response::{OnRead, ReadControl, Response},
};
