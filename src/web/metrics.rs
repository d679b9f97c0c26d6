//! Prometheus request metrics.
//!
//! [`RequestMetrics`] is both the middleware that records every request and
//! the registry served by `GET /metrics`. Wrap the app with a clone and
//! register another clone as app data.

use actix_web::dev::{self, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{get, web, Error, HttpResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::rc::Rc;
use std::time::{Duration, Instant};

const LABELS: &[&str] = &["method", "path", "status"];
const UNMATCHED_PATH: &str = "unmatched";

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(metrics);
}

/// Request counter and latency histogram with their own registry.
#[derive(Clone)]
pub struct RequestMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

impl RequestMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests served"),
            LABELS,
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            LABELS,
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
        })
    }

    /// Record one finished request.
    pub fn observe(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        let labels = [method, path, status.as_str()];

        self.requests_total.with_label_values(&labels).inc();
        self.request_duration_seconds
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
    }

    /// Text exposition of everything in the registry.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for RequestMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestMetricsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestMetricsMiddleware {
            service: Rc::new(service),
            metrics: self.clone(),
        }))
    }
}

/// Request metrics middleware
pub struct RequestMetricsMiddleware<S> {
    service: Rc<S>,
    metrics: RequestMetrics,
}

impl<S, B> Service<ServiceRequest> for RequestMetricsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let req_metrics = self.metrics.clone();
        let method = req.method().to_string();
        let started = Instant::now();

        Box::pin(async move {
            let res = svc.call(req).await?;

            // Route patterns keep label cardinality bounded.
            let path = res
                .request()
                .match_pattern()
                .unwrap_or_else(|| UNMATCHED_PATH.to_string());
            req_metrics.observe(&method, &path, res.status().as_u16(), started.elapsed());

            Ok(res)
        })
    }
}

/// GET /metrics - Prometheus scrape endpoint
#[get("/metrics")]
async fn metrics(metrics: web::Data<RequestMetrics>) -> HttpResponse {
    match metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type(TextEncoder::new().format_type())
            .body(body),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
