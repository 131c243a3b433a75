use axum::http::StatusCode;
use tracing::error;

use agora_store::StoreError;

/// Map store failures onto REST status codes. Domain conditions keep their
/// meaning; infrastructure failures collapse to 500 and are logged here.
pub fn status_for(err: StoreError) -> StatusCode {
    match &err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        StoreError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => {
            error!("store failure: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
