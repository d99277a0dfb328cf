use axum::{http::StatusCode, response::IntoResponse};

pub type AppResult<T> = Result<T, AppErr>;

#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        let (code, body) = match self {
            AppErr::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (code, body).into_response()
    }
}
