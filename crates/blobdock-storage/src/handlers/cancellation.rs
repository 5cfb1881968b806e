//! Per-request cancellation token

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Token cancelled when the handler future is dropped, e.g. on client
/// disconnect.
///
/// When a `CancellationToken` is present in the request extensions (a
/// server-wide shutdown token), the request token is its child.
pub struct RequestCancellation {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestCancellation {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl<S> FromRequestParts<S> for RequestCancellation
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = match parts.extensions.get::<CancellationToken>() {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let guard = token.clone().drop_guard();
        Ok(Self {
            token,
            _guard: guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_dropping_extractor_cancels_token() {
        let (mut parts, _) = Request::new(()).into_parts();
        let cancellation = RequestCancellation::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        let token = cancellation.token().clone();
        assert!(!token.is_cancelled());

        drop(cancellation);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_follows_parent_token() {
        let parent = CancellationToken::new();
        let mut request = Request::new(());
        request.extensions_mut().insert(parent.clone());
        let (mut parts, _) = request.into_parts();

        let cancellation = RequestCancellation::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        parent.cancel();
        assert!(cancellation.token().is_cancelled());
    }
}
