//! Request spans
//!
//! Spans carry the path only. Query strings stay out of the logs since the
//! realtime feed accepts its token there.

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;

use super::request_id::X_REQUEST_ID;

#[derive(Debug, Clone, Copy, Default)]
pub struct PathSpan;

impl<B> MakeSpan<B> for PathSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            version = ?request.version(),
            request_id = %request_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn query_string_never_reaches_the_log() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let request = Request::builder()
            .uri("/realtime?table=bids&access_token=secret.jwt.value")
            .header(X_REQUEST_ID, "req-1")
            .body(())
            .unwrap();

        tracing::subscriber::with_default(subscriber, || {
            let span = PathSpan.make_span(&request);
            let _entered = span.enter();
            tracing::info!("handled");
        });

        let output = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(output.contains("path=/realtime"), "{}", output);
        assert!(output.contains("req-1"), "{}", output);
        assert!(!output.contains("access_token"), "{}", output);
        assert!(!output.contains("secret.jwt.value"), "{}", output);
    }
}
