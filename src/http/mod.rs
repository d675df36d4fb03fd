//! Scoped HTTP client.
//!
//! [`HttpController`] owns one client handle per scope, builds requests
//! against its defaults, sends them over a [`Transport`] and decodes JSON
//! bodies through a lenient charset chain. [`get_cache_transport`] plugs an
//! on-disk response cache in front of the network.

mod charset;
mod client;
mod controller;
mod error;
mod methods;
mod request;
mod response;
mod transport;

pub mod encoders;

pub use charset::{DecodeStep, DecodedText, DefaultEncoding, autodetect_charset, decode_content};
pub use client::Client;
pub use controller::{ControllerConfig, HttpController};
pub use error::{HttpError, Result};
pub use methods::{RequestData, build_request, save_bytes};
pub use request::{Auth, HttpRequest, RequestOptions, RequestUrl};
pub use response::{HttpResponse, ResponseBody};
pub use transport::{
    CacheTransport, ClientCert, DEFAULT_CACHE_DIR, FileStorage, Limits, PlainTransport,
    PlainTransportBuilder, Transport, get_cache_transport,
};

pub use reqwest::{Method, StatusCode};

#[cfg(test)]
mod tests;
