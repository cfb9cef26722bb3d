// convert-image library
// Image conversion server: multipart upload in, transcoded image out

pub mod config;
pub mod constants;
pub mod converter;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod security;
pub mod server;
pub mod upload;
