// Server module - Pingora ProxyHttp implementation
// Every request is answered locally in request_filter; nothing is proxied upstream.

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::constants::{CONVERT_PATH, HEALTH_PATH, METRICS_PATH, MULTIPART_OVERHEAD_ALLOWANCE};
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::security::{self, SecurityError};

pub mod body;
pub mod context;
pub mod convert;
pub mod endpoints;
pub mod static_files;

pub use body::{BodyCollector, CollectedBody};
pub use context::RequestContext;
pub use convert::{content_disposition, ConvertHandler};
pub use endpoints::EndpointResponse;

/// Where a request is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Convert,
    Health,
    Metrics,
    Static,
    MethodNotAllowed,
    NotFound,
}

impl Route {
    pub fn resolve(method: &str, path: &str) -> Self {
        match (method, path) {
            ("POST", CONVERT_PATH) => Route::Convert,
            (_, CONVERT_PATH) => Route::MethodNotAllowed,
            ("GET" | "HEAD", HEALTH_PATH) => Route::Health,
            ("GET" | "HEAD", METRICS_PATH) => Route::Metrics,
            ("GET" | "HEAD", _) => Route::Static,
            _ => Route::NotFound,
        }
    }
}

/// ConvertServer implements the Pingora ProxyHttp trait
/// Serves the conversion API, the client page and the operational endpoints
pub struct ConvertServer {
    convert: ConvertHandler,
    metrics: Arc<Metrics>,
    static_dir: PathBuf,
    /// Largest request body read before answering "too large"
    max_body_size: usize,
    /// Server start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl ConvertServer {
    /// Create a new ConvertServer instance from configuration
    pub fn new(config: Config) -> Self {
        let metrics = Arc::new(Metrics::new());
        let max_body_size =
            security::body_limit(config.converter.max_file_size, MULTIPART_OVERHEAD_ALLOWANCE);

        Self {
            convert: ConvertHandler::new(config.converter, metrics.clone()),
            metrics,
            static_dir: config.static_dir,
            max_body_size,
            start_time: Instant::now(),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Read the request body, keeping only a prefix once it is over the limit
    async fn read_body(
        &self,
        session: &mut Session,
        ctx: &mut RequestContext,
        content_length: Option<usize>,
    ) -> Result<CollectedBody> {
        let mut collector =
            BodyCollector::new(content_length, self.max_body_size, MULTIPART_OVERHEAD_ALLOWANCE);
        while collector.wants_more() {
            let Some(chunk) = session.read_request_body().await? else {
                break;
            };
            ctx.add_bytes_received(chunk.len());
            collector.push(&chunk);
        }
        Ok(collector.finish())
    }

    async fn handle_convert(&self, session: &mut Session, ctx: &mut RequestContext) -> Result<EndpointResponse> {
        let req = session.req_header();
        let content_type = req
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = req
            .headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok());

        match self.read_body(session, ctx, content_length).await? {
            CollectedBody::Complete(body) => Ok(self
                .convert
                .handle(ctx.request_id(), content_type.as_deref(), body)
                .await),
            CollectedBody::Oversized(prefix) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    content_length = ?content_length,
                    limit = self.max_body_size,
                    "Request payload too large"
                );
                // The rest of the body is never read
                session.set_keepalive(None);
                Ok(self
                    .convert
                    .reject_oversized(ctx.request_id(), content_type.as_deref(), prefix)
                    .await)
            }
        }
    }

    async fn handle_static(&self, ctx: &RequestContext) -> EndpointResponse {
        match static_files::serve_static(&self.static_dir, ctx.path()).await {
            Ok(response) => response,
            Err(err) => {
                if let AppError::Security(SecurityError::PathTraversal { path }) = &err {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        path = %path,
                        "Path traversal attempt detected"
                    );
                } else if err.to_http_status() >= 500 {
                    tracing::error!(request_id = %ctx.request_id(), error = %err, "Static file error");
                }
                EndpointResponse::error(&err)
            }
        }
    }
}

/// Write a complete response; HEAD requests get headers only
pub async fn write_response(session: &mut Session, response: &EndpointResponse, head_only: bool) -> Result<()> {
    let mut header = ResponseHeader::build(response.status, None)?;
    header.insert_header("Content-Type", response.content_type.as_str())?;
    header.insert_header("Content-Length", response.body.len().to_string())?;
    for (name, value) in &response.headers {
        header.insert_header(*name, value.as_str())?;
    }

    if head_only {
        session.write_response_header(Box::new(header), true).await?;
    } else {
        session.write_response_header(Box::new(header), false).await?;
        session
            .write_response_body(Some(response.body.clone()), true)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl ProxyHttp for ConvertServer {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new("GET".to_string(), "/".to_string())
    }

    /// Never reached: request_filter answers every request
    async fn upstream_peer(&self, _session: &mut Session, _ctx: &mut Self::CTX) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "convert-image has no upstream",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let method = session.req_header().method.as_str().to_string();
        let path = session.req_header().uri.path().to_string();
        ctx.set_request(&method, &path);
        self.metrics.increment_request_count();

        let route = Route::resolve(&method, &path);
        tracing::debug!(request_id = %ctx.request_id(), method = %method, path = %path, route = ?route, "Routing request");

        let response = match route {
            Route::Convert => self.handle_convert(session, ctx).await?,
            Route::Health => endpoints::handle_health(self.start_time),
            Route::Metrics => endpoints::handle_metrics(&self.metrics),
            Route::Static => self.handle_static(ctx).await,
            Route::MethodNotAllowed => EndpointResponse::error(&AppError::MethodNotAllowed),
            Route::NotFound => EndpointResponse::error(&AppError::NotFound),
        };

        ctx.set_bytes_sent(response.body.len());
        write_response(session, &response, method == "HEAD").await?;

        Ok(true) // Request handled
    }

    async fn logging(&self, session: &mut Session, _e: Option<&pingora_core::Error>, ctx: &mut Self::CTX) {
        // Get status code from response header
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        let duration_ms = ctx.elapsed().as_secs_f64() * 1000.0;

        self.metrics.increment_status_count(status_code);
        self.metrics.increment_method_count(ctx.method());
        self.metrics.record_duration(duration_ms);
        self.metrics.add_bytes_received(ctx.bytes_received());
        self.metrics.add_bytes_sent(ctx.bytes_sent());

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = status_code,
            duration_ms = duration_ms,
            bytes_received = ctx.bytes_received(),
            bytes_sent = ctx.bytes_sent(),
            "Request completed"
        );
    }
}
