//! The prediction server.
//!
//! # Responsibilities
//! - Run the sequential accept loop until shutdown
//! - Frame one request per connection, dispatch on route, write one response
//! - Drive decode → classify → encode for `/predict`
//! - Notify the peer after successful predictions, before replying
//! - Record per-request logs and metrics

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ServiceConfig;
use crate::http::request::{read_request, FramingLimits, IncomingRequest, Route};
use crate::http::response::{encode_status, help_page, HttpResponse};
use crate::inference::{classify, InferenceResult, ModelHandle};
use crate::net::{ConnectionId, ExchangeSummary, Listener};
use crate::observability::metrics;
use crate::pixels::decode_pixels;
use crate::relay::{ForwardError, PeerForwarder};

/// Single-threaded HTTP front end for the classifier.
///
/// Owns the model outright; each request borrows it mutably, so no locking
/// is involved.
#[derive(Debug)]
pub struct PredictionServer {
    model: ModelHandle,
    forwarder: Option<PeerForwarder>,
    limits: FramingLimits,
    close_grace: Duration,
    accept_retry: Duration,
    heap_budget: u64,
    local_addr: Option<SocketAddr>,
}

impl PredictionServer {
    /// Build a server around an already loaded model.
    pub fn new(config: &ServiceConfig, model: ModelHandle) -> Result<Self, ForwardError> {
        let forwarder = if config.peer.enabled {
            Some(PeerForwarder::new(&config.peer)?)
        } else {
            None
        };

        Ok(Self {
            model,
            forwarder,
            limits: FramingLimits::from_config(&config.timeouts, &config.limits),
            close_grace: config.timeouts.close_grace(),
            accept_retry: config.listener.accept_retry(),
            heap_budget: config.model.heap_budget_bytes,
            local_addr: None,
        })
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Remaining heap budget after the model's resident footprint.
    pub fn heap_free(&self) -> u64 {
        self.heap_budget
            .saturating_sub(self.model.resident_bytes() as u64)
    }

    /// Accept and serve connections one at a time until `shutdown` fires.
    ///
    /// Dropping the shutdown coordinator also stops the loop. A connection
    /// already being served always completes first.
    pub async fn run(mut self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        self.local_addr = Some(listener.local_addr());

        tracing::info!(
            address = %listener.local_addr(),
            model_initialized = self.model.is_initialized(),
            peer = self.forwarder.as_ref().map(|f| f.url()).unwrap_or("disabled"),
            "Prediction server starting"
        );

        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    self.serve_connection(stream, peer).await;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in = ?self.accept_retry,
                        "Accept failed; backing off"
                    );
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(self.accept_retry) => {}
                    }
                }
            }
        }

        tracing::info!("Prediction server stopped");
    }

    /// Serve exactly one request on `stream`, then close it.
    pub async fn serve_connection(&mut self, stream: TcpStream, peer: SocketAddr) -> ExchangeSummary {
        let id = ConnectionId::new();
        let span = tracing::info_span!("connection", connection_id = %id, peer_addr = %peer);
        self.exchange(id, stream).instrument(span).await
    }

    async fn exchange(&mut self, id: ConnectionId, mut stream: TcpStream) -> ExchangeSummary {
        let (rd, mut wr) = stream.split();
        let mut reader = BufReader::new(rd);

        let request = read_request(&mut reader, &self.limits).await;
        let route = request.route();
        log_framing(&request, route);
        metrics::record_request(route);

        let response = self.respond(&request).await;
        let bytes = response.to_bytes();

        let write_error = match write_response(&mut wr, &bytes, self.limits.body_timeout).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write response");
                Some(e.to_string())
            }
        };

        // Let the client drain the response before the socket goes away.
        tokio::time::sleep(self.close_grace).await;
        if let Err(e) = wr.shutdown().await {
            tracing::debug!(error = %e, "Socket shutdown failed");
        }

        let summary = ExchangeSummary {
            id,
            route,
            body_bytes: request.body.len(),
            response_bytes: bytes.len(),
            framing: request.report,
            write_error,
        };
        tracing::debug!(clean = summary.is_clean(), "Connection closed");
        summary
    }

    /// Produce the response for a framed request.
    pub async fn respond(&mut self, request: &IncomingRequest) -> HttpResponse {
        match request.route() {
            Route::Predict => self.predict(&request.body_text()).await,
            Route::Status => {
                let initialized = self.model.is_initialized();
                let result = InferenceResult::status(initialized);
                HttpResponse::json(encode_status(&result, self.heap_free(), initialized))
            }
            Route::Help => HttpResponse::html(help_page(self.local_addr)),
        }
    }

    /// Decode, classify, encode and (on success) forward one prediction.
    pub async fn predict(&mut self, document: &str) -> HttpResponse {
        let started = Instant::now();
        let result = match decode_pixels(document) {
            Ok(image) => classify(&mut self.model, &image),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected pixel payload");
                InferenceResult::from(e)
            }
        };
        metrics::record_inference(&result, started);

        let body = encode_status(&result, self.heap_free(), self.model.is_initialized());

        if result.success {
            tracing::info!(
                digit = result.predicted_digit,
                confidence = result.confidence,
                "Prediction complete"
            );
            if let Some(forwarder) = &self.forwarder {
                let outcome = forwarder.forward(&body).await;
                metrics::record_forward(outcome);
            }
        }

        HttpResponse::json(body)
    }
}

fn log_framing(request: &IncomingRequest, route: Route) {
    tracing::info!(
        route = route.as_str(),
        request_line = %request.request_line,
        body_bytes = request.body.len(),
        "Request framed"
    );

    let report = &request.report;
    if report.header_timed_out {
        tracing::warn!("Header deadline elapsed; continuing with partial request");
    }
    if report.body_timed_out {
        tracing::warn!(
            declared = request.content_length.unwrap_or(0),
            received = request.body.len(),
            "Body deadline elapsed; continuing with partial body"
        );
    }
    if report.body_skipped {
        tracing::warn!(
            declared = request.content_length.unwrap_or(0),
            "Declared body too large; not read"
        );
    }
    if let Some(e) = &report.io_error {
        tracing::warn!(error = %e, "Read error while framing request");
    }
}

/// Write and flush the whole response, bounded by `limit`.
async fn write_response<W>(writer: &mut W, bytes: &[u8], limit: Duration) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    };
    match tokio::time::timeout(limit, write).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "response write deadline elapsed",
        )),
    }
}
