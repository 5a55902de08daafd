//! Request and handshake instrumentation behind the `tracing` and `metrics`
//! features. Everything here compiles to nothing when both are off.

use std::time::Instant;

use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::types::RawResponse;

/// Which client issued a request.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(not(all(feature = "blocking", feature = "async")), allow(dead_code))]
pub(crate) enum Mode {
    Blocking,
    Tokio,
}

impl Mode {
    #[cfg_attr(not(any(feature = "metrics", feature = "tracing")), allow(dead_code))]
    fn label(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Tokio => "tokio",
        }
    }
}

/// Record one request/response exchange started at `start`.
pub(crate) fn request(
    mode: Mode,
    operation: Operation,
    start: Instant,
    result: &Result<RawResponse>,
) {
    let _ = (mode, operation, start, result);

    #[cfg(feature = "metrics")]
    {
        let mode = mode.label();
        let outcome = if result.is_ok() { "ok" } else { "err" };
        metrics::counter!("ipmi_requests_total", "mode" => mode, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("ipmi_request_seconds", "mode" => mode)
            .record(start.elapsed().as_secs_f64());
        match result {
            Ok(resp) if !resp.is_ok() => {
                metrics::counter!("ipmi_completion_code_nonzero_total", "mode" => mode)
                    .increment(1);
            }
            Ok(_) => {}
            Err(err) => {
                metrics::counter!("ipmi_request_errors_total", "mode" => mode, "kind" => error_kind(err))
                    .increment(1);
            }
        }
    }

    #[cfg(feature = "tracing")]
    {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(resp) => tracing::debug!(
                mode = mode.label(),
                %operation,
                completion_code = resp.completion_code.0,
                elapsed_ms,
                "request completed"
            ),
            Err(err) => tracing::warn!(
                mode = mode.label(),
                %operation,
                error = %err,
                elapsed_ms,
                "request failed"
            ),
        }
    }
}

/// Record the outcome of opening the UDP channel to a BMC.
pub(crate) fn connection_opened<T>(result: &Result<T>) {
    let _ = result;

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("ipmi_connection_open_attempts_total").increment(1);
        match result {
            Ok(_) => metrics::counter!("ipmi_connections_open_total").increment(1),
            Err(err) => {
                metrics::counter!("ipmi_connection_open_failures_total", "kind" => error_kind(err))
                    .increment(1)
            }
        }
    }

    #[cfg(feature = "tracing")]
    if let Err(err) = result {
        tracing::warn!(error = %err, "opening the bmc channel failed");
    }
}

/// Mark the start of a session handshake.
pub(crate) fn handshake_started() {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_session_attempts_total").increment(1);
}

/// Record how a session handshake ended.
pub(crate) fn handshake_finished<T>(result: &Result<T>) {
    let _ = result;

    #[cfg(feature = "metrics")]
    match result {
        Ok(_) => metrics::counter!("ipmi_sessions_established_total").increment(1),
        Err(err) => {
            metrics::counter!("ipmi_session_failures_total", "kind" => error_kind(err))
                .increment(1)
        }
    }

    #[cfg(feature = "tracing")]
    if let Err(err) = result {
        tracing::warn!(error = %err, "session establishment failed");
    }
}

#[cfg_attr(not(feature = "metrics"), allow(dead_code))]
fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::Io(_) => "io",
        Error::Timeout => "timeout",
        Error::Truncated(_) => "truncated",
        Error::Checksum { .. } => "checksum",
        Error::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
        Error::Authentication(_) => "authentication",
        Error::Integrity(_) => "integrity",
        Error::Negotiation(_) | Error::OpenSessionRejected { .. } => "negotiation",
        Error::SessionClosed => "session_closed",
        Error::Protocol(_) => "protocol",
        Error::Crypto(_) => "crypto",
        Error::InvalidArgument(_) => "invalid_argument",
        Error::CompletionCode { .. } => "completion_code",
    }
}
