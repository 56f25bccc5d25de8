#![forbid(unsafe_code)]

//! Turns a video link into metadata, a direct media stream, or a list of
//! converter links. The `backend` binary serves all of it over HTTP.

pub mod config;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod mux;
pub mod pipeline;
pub mod process;
pub mod provider;
pub mod redirect;
pub mod security;
pub mod server;
pub mod staging;
pub mod video_id;
