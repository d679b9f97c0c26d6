//! Feature flag endpoints

use crate::flags::{FlagError, FlagService, FlagUpdate, NewFlag};
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.app_data(web::JsonConfig::default().error_handler(super::error::json_error))
        .service(list_flags)
        .service(create_flag)
        .service(toggle_flag)
        .service(get_flag)
        .service(update_flag)
        .service(delete_flag);
}

#[derive(Deserialize)]
struct EnvironmentQuery {
    environment: Option<String>,
}

#[derive(Deserialize)]
struct ToggleRequest {
    environment: Option<String>,
}

/// GET /flags?environment=E - All flags with `enabled` for E
#[get("/flags")]
async fn list_flags(
    service: web::Data<FlagService>,
    query: web::Query<EnvironmentQuery>,
) -> Result<HttpResponse, FlagError> {
    let environment = query
        .environment
        .as_deref()
        .unwrap_or_else(|| service.default_environment());

    let flags = service.list_flags(environment).await?;
    Ok(HttpResponse::Ok().json(flags))
}

/// POST /flags - Create a flag
#[post("/flags")]
async fn create_flag(
    service: web::Data<FlagService>,
    body: web::Json<NewFlag>,
) -> Result<HttpResponse, FlagError> {
    let flag = service.create_flag(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(flag))
}

/// GET /flags/{id} - Single flag
#[get("/flags/{id}")]
async fn get_flag(
    service: web::Data<FlagService>,
    path: web::Path<String>,
) -> Result<HttpResponse, FlagError> {
    let flag = service.get_flag(&path).await?;
    Ok(HttpResponse::Ok().json(flag))
}

/// PUT /flags/{id} - Replace the supplied fields
#[put("/flags/{id}")]
async fn update_flag(
    service: web::Data<FlagService>,
    path: web::Path<String>,
    body: web::Json<FlagUpdate>,
) -> Result<HttpResponse, FlagError> {
    let flag = service.update_flag(&path, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(flag))
}

/// DELETE /flags/{id}
#[delete("/flags/{id}")]
async fn delete_flag(
    service: web::Data<FlagService>,
    path: web::Path<String>,
) -> Result<HttpResponse, FlagError> {
    if service.delete_flag(&path).await? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(FlagError::NotFound)
    }
}

/// POST /flags/{id}/toggle - Flip the flag in one environment
///
/// The body is optional; without one the default environment is toggled.
#[post("/flags/{id}/toggle")]
async fn toggle_flag(
    service: web::Data<FlagService>,
    path: web::Path<String>,
    body: Option<web::Json<ToggleRequest>>,
) -> Result<HttpResponse, FlagError> {
    let environment = body
        .and_then(|body| body.into_inner().environment)
        .unwrap_or_else(|| service.default_environment().to_string());

    let flag = service.toggle_flag(&path, &environment).await?;
    Ok(HttpResponse::Ok().json(flag))
}
