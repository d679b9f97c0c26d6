//! JSON error bodies and logging of unexpected failures.

use crate::flags::FlagError;
use actix_web::dev::ServiceResponse;
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

/// Body of every 4xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of every 500 response. Carries no detail about the cause.
#[derive(Debug, Serialize)]
pub struct InternalErrorBody {
    pub error: &'static str,
    pub message: &'static str,
}

pub const INTERNAL_ERROR: InternalErrorBody = InternalErrorBody {
    error: "Internal Server Error",
    message: "An unexpected error occurred",
};

impl ResponseError for FlagError {
    fn status_code(&self) -> StatusCode {
        match self {
            FlagError::Validation(_) => StatusCode::BAD_REQUEST,
            FlagError::NotFound => StatusCode::NOT_FOUND,
            FlagError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            FlagError::Storage(_) => HttpResponse::InternalServerError().json(INTERNAL_ERROR),
            _ => HttpResponse::build(self.status_code()).json(ErrorBody {
                error: self.to_string(),
            }),
        }
    }
}

/// Reject unreadable request bodies with a JSON 400.
pub fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::debug!("Bad JSON body for {} {}: {}", req.method(), req.path(), err);
    let body = ErrorBody {
        error: err.to_string(),
    };
    InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

/// Log every 500 with the request that caused it. The response is unchanged.
pub fn render_500<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    {
        let req = res.request();
        let info = req.connection_info();
        let cause = res
            .response()
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no error attached".to_string());

        log::error!(
            "Unhandled exception: {} {} from {}: {}",
            req.method(),
            req.path(),
            info.realip_remote_addr().unwrap_or("-"),
            cause
        );
    }

    Ok(ErrorHandlerResponse::Response(res.map_into_left_body()))
}
