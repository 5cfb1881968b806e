use std::collections::BTreeMap;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::{response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Media type of RFC 7807 error bodies.
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Representation of a Problem error to return to the client.
/// Follows RFC 7807 - Problem Details for HTTP APIs
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "title": "Blob Not Found",
    "detail": "Blob 'report.pdf' does not exist",
    "status": 404
}))]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_url: Option<String>,
    /// A short, human-readable summary of the problem type
    #[schema(example = "Blob Not Found")]
    pub title: String,
    /// A human-readable explanation specific to this occurrence of the problem
    #[schema(example = "Blob 'report.pdf' does not exist")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The HTTP status code of this occurrence
    #[schema(example = 404)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// A URI reference that identifies the specific occurrence of the problem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// An error response under construction.
#[derive(Debug, Clone)]
pub struct Problem {
    /// The status code of the problem.
    pub status_code: StatusCode,
    /// The actual body of the problem.
    pub body: BTreeMap<String, Value>,
}

/// Create a new `Problem` response to send to the client.
///
/// The numeric status is always part of the body so clients reading only
/// the JSON still see it.
pub fn new<S>(status_code: S) -> Problem
where
    S: Into<StatusCode>,
{
    let status_code = status_code.into();
    Problem {
        status_code,
        body: BTreeMap::new(),
    }
    .with_value("status", status_code.as_u16())
}

impl Problem {
    /// Specify the "title" to use for the problem.
    pub fn with_title<S>(self, value: S) -> Self
    where
        S: Into<String>,
    {
        self.with_value("title", value.into())
    }

    /// Specify the "detail" to use for the problem.
    pub fn with_detail<S>(self, value: S) -> Self
    where
        S: Into<String>,
    {
        self.with_value("detail", value.into())
    }

    /// Specify the "instance" to use for the problem.
    pub fn with_instance<S>(self, value: S) -> Self
    where
        S: Into<String>,
    {
        self.with_value("instance", value.into())
    }

    /// Specify an arbitrary value to include in the problem.
    pub fn with_value<V>(mut self, key: &str, value: V) -> Self
    where
        V: Into<Value>,
    {
        self.body.insert(key.to_owned(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status_code
    }

    /// The "title" member, if one was set.
    pub fn title(&self) -> Option<&str> {
        self.body.get("title").and_then(Value::as_str)
    }

    /// The "detail" member, if one was set.
    pub fn detail(&self) -> Option<&str> {
        self.body.get("detail").and_then(Value::as_str)
    }
}

impl<S> From<S> for Problem
where
    S: Into<StatusCode>,
{
    fn from(status_code: S) -> Self {
        new(status_code.into())
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        if self.status_code.is_server_error() {
            tracing::warn!(
                status = self.status_code.as_u16(),
                detail = self.detail().unwrap_or_default(),
                "request failed"
            );
        }

        let mut response = (self.status_code, Json(self.body)).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_problem_records_status() {
        let problem = new(StatusCode::NOT_FOUND);
        assert_eq!(problem.status(), StatusCode::NOT_FOUND);
        assert_eq!(problem.body.get("status"), Some(&Value::from(404)));
    }

    #[test]
    fn test_builder_sets_members() {
        let problem = new(StatusCode::CONFLICT)
            .with_title("Container Already Exists")
            .with_detail("Container 'images' already exists")
            .with_instance("/storage-account/add-container");

        assert_eq!(problem.title(), Some("Container Already Exists"));
        assert_eq!(problem.detail(), Some("Container 'images' already exists"));
        assert_eq!(
            problem.body.get("instance").and_then(Value::as_str),
            Some("/storage-account/add-container")
        );
    }

    #[test]
    fn test_into_response_uses_problem_json() {
        let response = new(StatusCode::BAD_REQUEST)
            .with_title("Invalid Request")
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], PROBLEM_JSON);
    }
}
