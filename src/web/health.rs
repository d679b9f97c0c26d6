use crate::flags::FlagService;
use actix_web::{get, web, HttpResponse};
use serde::Serialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(health);
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
}

/// Liveness plus the backend currently serving flags.
#[get("/health")]
async fn health(service: web::Data<FlagService>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        backend: service.store().backend_name(),
    })
}
