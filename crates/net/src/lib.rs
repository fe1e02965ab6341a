//! Fetch collaborator: retrieves an entry location as a streamed response.
//!
//! The loader only depends on the [`Fetch`] trait. [`UreqFetch`] is the
//! bundled implementation: a worker thread performs the blocking request and
//! feeds body chunks through a bounded channel, so the consumer's pull rate
//! sets the read rate.

use futures::channel::mpsc;
use futures::future::LocalBoxFuture;
use futures::stream::{self, LocalBoxStream};
use futures::{FutureExt, SinkExt, StreamExt};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

pub type ByteStream = LocalBoxStream<'static, Result<Vec<u8>, FetchError>>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("reading body of {url} failed: {message}")]
    Body { url: String, message: String },
    #[error("fetch worker for {url} went away")]
    Disconnected { url: String },
    #[error("fetch configuration error: {0}")]
    Config(String),
}

/// Response head plus an optional streamed body.
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Option<ByteStream>,
}

impl Response {
    /// A 200 response whose body is `chunks`, in order.
    pub fn from_chunks(url: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: Some(stream::iter(chunks.into_iter().map(Ok)).boxed_local()),
        }
    }

    pub fn from_text(url: impl Into<String>, text: &str) -> Self {
        Self::from_chunks(url, vec![text.as_bytes().to_vec()])
    }

    /// A response that carries no body stream at all.
    pub fn without_body(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: None,
            body: None,
        }
    }

    pub fn with_body(mut self, body: ByteStream) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

pub trait Fetch {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Response, FetchError>>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> LocalBoxFuture<'static, Result<Response, FetchError>>,
{
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Response, FetchError>> {
        self(url)
    }
}

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Bytes read from the socket per body chunk.
    pub chunk_size: usize,
    /// Chunks buffered ahead of the consumer before the worker blocks.
    pub channel_capacity: usize,
    /// Trust the platform certificate store instead of the bundled roots.
    pub native_roots: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("entryway/", env!("CARGO_PKG_VERSION")).to_string(),
            chunk_size: 16 * 1024,
            channel_capacity: 4,
            native_roots: true,
        }
    }
}

/// Events the fetch worker reports, in order: `Start`, any number of
/// `Chunk`s, then `Done` or `Error`.
#[derive(Debug)]
pub enum NetEvent {
    Start {
        url: String,
        status: u16,
        content_type: Option<String>,
    },
    Chunk(Vec<u8>),
    Done,
    Error(FetchError),
}

#[derive(Clone)]
pub struct UreqFetch {
    agent: ureq::Agent,
    config: FetchConfig,
}

impl UreqFetch {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut builder = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);
        if config.native_roots {
            match native_tls_config()? {
                Some(tls) => builder = builder.tls_config(tls),
                None => log::warn!(
                    target: "entry.net",
                    "no native root certificates found; using bundled roots"
                ),
            }
        }
        Ok(Self {
            agent: builder.build(),
            config,
        })
    }
}

impl Fetch for UreqFetch {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Response, FetchError>> {
        let mut events = fetch_stream(self.agent.clone(), url.to_string(), &self.config);
        let requested = url.to_string();
        async move {
            match events.next().await {
                Some(NetEvent::Start {
                    url,
                    status,
                    content_type,
                }) => {
                    let body = events
                        .filter_map(|event| {
                            futures::future::ready(match event {
                                NetEvent::Chunk(bytes) => Some(Ok(bytes)),
                                NetEvent::Error(err) => Some(Err(err)),
                                NetEvent::Start { .. } | NetEvent::Done => None,
                            })
                        })
                        .boxed_local();
                    Ok(Response {
                        url,
                        status,
                        content_type,
                        body: Some(body),
                    })
                }
                Some(NetEvent::Error(err)) => Err(err),
                Some(NetEvent::Chunk(_) | NetEvent::Done) | None => {
                    Err(FetchError::Disconnected { url: requested })
                }
            }
        }
        .boxed_local()
    }
}

/// Start a worker thread that performs the request and reports [`NetEvent`]s.
///
/// The channel is bounded; dropping the receiver stops the worker at its
/// next send.
pub fn fetch_stream(agent: ureq::Agent, url: String, config: &FetchConfig) -> mpsc::Receiver<NetEvent> {
    let (mut tx, rx) = mpsc::channel(config.channel_capacity);
    let chunk_size = config.chunk_size.max(1);
    thread::spawn(move || {
        let start = Instant::now();
        let send = |tx: &mut mpsc::Sender<NetEvent>, event| futures::executor::block_on(tx.send(event)).is_ok();

        let response = match agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                send(&mut tx, NetEvent::Error(FetchError::Status { url, status }));
                return;
            }
            Err(err) => {
                let message = err.to_string();
                send(&mut tx, NetEvent::Error(FetchError::Request { url, message }));
                return;
            }
        };

        let final_url = response.get_url().to_string();
        let start_event = NetEvent::Start {
            url: final_url.clone(),
            status: response.status(),
            content_type: response.header("content-type").map(str::to_string),
        };
        if !send(&mut tx, start_event) {
            return;
        }

        let mut reader = response.into_reader();
        let mut total = 0usize;
        loop {
            let mut buf = vec![0u8; chunk_size];
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    total += n;
                    if !send(&mut tx, NetEvent::Chunk(buf)) {
                        log::debug!(target: "entry.net", "consumer dropped {final_url}; stopping");
                        return;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    let message = err.to_string();
                    send(&mut tx, NetEvent::Error(FetchError::Body { url: final_url, message }));
                    return;
                }
            }
        }
        log::debug!(
            target: "entry.net",
            "fetched {final_url}: {total} bytes in {}ms",
            start.elapsed().as_millis()
        );
        send(&mut tx, NetEvent::Done);
    });
    rx
}

fn native_tls_config() -> Result<Option<Arc<rustls::ClientConfig>>, FetchError> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        log::debug!(target: "entry.net", "native certificate error: {err}");
    }
    let mut roots = rustls::RootCertStore::empty();
    let (added, _ignored) = roots.add_parsable_certificates(loaded.certs);
    if added == 0 {
        return Ok(None);
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|err| FetchError::Config(err.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Some(Arc::new(config)))
}

/// True when `entry` carries its own protocol (`scheme://...`) and is
/// therefore a location rather than literal markup.
pub fn has_own_protocol(entry: &str) -> bool {
    let trimmed = entry.trim();
    if trimmed.starts_with('<') {
        return false;
    }
    url::Url::parse(trimmed).is_ok_and(|url| trimmed[url.scheme().len()..].starts_with("://"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn own_protocol_detection() {
        assert!(has_own_protocol("https://example.com/app/"));
        assert!(has_own_protocol("http://localhost:8080"));
        assert!(has_own_protocol("file:///tmp/index.html"));
        assert!(!has_own_protocol("//cdn.example.com/index.html"));
        assert!(!has_own_protocol("<div>hi</div>"));
        assert!(!has_own_protocol("index.html"));
        assert!(!has_own_protocol("mailto:someone@example.com"));
    }

    #[test]
    fn response_from_chunks_streams_in_order() {
        let response = Response::from_chunks("mem://x", vec![b"ab".to_vec(), b"cd".to_vec()]);
        let body = response.body.expect("body");
        let chunks: Vec<_> = block_on(body.collect::<Vec<_>>());
        assert_eq!(chunks, vec![Ok(b"ab".to_vec()), Ok(b"cd".to_vec())]);
    }

    #[test]
    fn closures_implement_fetch() {
        let fetch = |url: &str| {
            let url = url.to_string();
            async move { Ok::<_, FetchError>(Response::without_body(url, 204)) }.boxed_local()
        };
        let response = block_on(fetch.fetch("https://example.com")).expect("response");
        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
    }
}
