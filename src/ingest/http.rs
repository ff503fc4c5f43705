//! HTTP frame stream source.
//!
//! Opens a single long-lived `GET` against the frame server and hands the
//! response body to the demultiplexer as a buffered reader. There is no
//! reconnect logic: when the body ends or the socket fails, the stream is over.

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader};

use url::Url;

use super::demux::FrameStream;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Configuration for the HTTP stream source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpStreamConfig {
    /// Stream endpoint, e.g. `http://camera-host:5000/stream`.
    pub url: String,
    /// Milliseconds between frames requested from the server.
    pub interval_ms: u64,
    /// Number of frames requested from the server.
    pub count: u64,
}

impl Default for HttpStreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5000/stream".to_string(),
            interval_ms: 1000,
            count: 20,
        }
    }
}

impl HttpStreamConfig {
    /// Full request URL including the `interval` and `count` query parameters.
    pub fn request_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url).context("parse stream url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported stream scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        url.query_pairs_mut()
            .append_pair("interval", &self.interval_ms.to_string())
            .append_pair("count", &self.count.to_string());
        Ok(url)
    }
}

/// HTTP stream source.
pub struct HttpStreamSource {
    config: HttpStreamConfig,
}

impl HttpStreamSource {
    pub fn new(config: HttpStreamConfig) -> Result<Self> {
        config.request_url()?;
        Ok(Self { config })
    }

    /// Issue the request and return a frame stream over the response body.
    pub fn connect(&self) -> Result<FrameStream<Box<dyn BufRead + Send>>> {
        let url = self.config.request_url()?;
        let response = ureq::get(url.as_str())
            .call()
            .with_context(|| format!("connect to frame stream {}", self.config.url))?;
        log::info!(
            "connected to {} (status {}, content-type {})",
            self.config.url,
            response.status(),
            response.header("Content-Type").unwrap_or("unknown")
        );
        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::with_capacity(
            READ_BUFFER_BYTES,
            response.into_reader(),
        ));
        Ok(FrameStream::new(reader))
    }
}
