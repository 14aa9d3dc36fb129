//! Observability sink for frames that did not change any state
//!
//! Decode failures and protocol anomalies are reported here and never reach
//! the projection layer.

use crate::protocol::DecodeError;
use crate::reconcile::Discard;
use crate::turns::TurnTransitionError;
use std::sync::Arc;

/// Something the relay dropped or refused
#[derive(Debug, Clone, Copy)]
pub enum Diagnostic<'a> {
    DecodeFailed(&'a DecodeError),
    Discarded {
        item_id: &'a str,
        turn_id: &'a str,
        discard: &'a Discard,
    },
    TurnIgnored(&'a TurnTransitionError),
}

/// External observability sink
pub trait DiagnosticSink {
    fn report(&self, session_id: &str, diagnostic: Diagnostic<'_>);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for &T {
    fn report(&self, session_id: &str, diagnostic: Diagnostic<'_>) {
        (**self).report(session_id, diagnostic);
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn report(&self, session_id: &str, diagnostic: Diagnostic<'_>) {
        (**self).report(session_id, diagnostic);
    }
}

/// Sink that writes diagnostics to `tracing`
///
/// Decode failures and anomalies go to `warn`; stale and duplicate delivery
/// of upserts and turn events, which is normal for the transport, goes to
/// `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, session_id: &str, diagnostic: Diagnostic<'_>) {
        match diagnostic {
            Diagnostic::DecodeFailed(error) => {
                tracing::warn!(session_id, error = %error, "Dropping undecodable frame");
            }
            Diagnostic::Discarded {
                item_id,
                turn_id,
                discard,
            } if discard.is_anomaly() => {
                tracing::warn!(
                    session_id,
                    item_id,
                    turn_id,
                    reason = discard.reason(),
                    detail = %discard,
                    "Upsert rejected"
                );
            }
            Diagnostic::Discarded {
                item_id,
                turn_id,
                discard,
            } => {
                tracing::debug!(
                    session_id,
                    item_id,
                    turn_id,
                    reason = discard.reason(),
                    "Upsert absorbed"
                );
            }
            Diagnostic::TurnIgnored(error) if error.is_anomaly() => {
                tracing::warn!(session_id, error = %error, "Turn event ignored");
            }
            Diagnostic::TurnIgnored(error) => {
                tracing::debug!(session_id, error = %error, "Redelivered turn event absorbed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Diagnostic, DiagnosticSink};
    use std::sync::Mutex;

    /// What a recorded diagnostic was about
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Recorded {
        DecodeFailed(String),
        Discarded { item_id: String, reason: &'static str },
        TurnIgnored(String),
    }

    /// Sink that keeps every diagnostic for assertions
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub recorded: Mutex<Vec<(String, Recorded)>>,
    }

    impl RecordingSink {
        pub fn entries(&self) -> Vec<(String, Recorded)> {
            self.recorded.lock().unwrap().clone()
        }

        pub fn reasons(&self) -> Vec<&'static str> {
            self.entries()
                .into_iter()
                .filter_map(|(_, recorded)| match recorded {
                    Recorded::Discarded { reason, .. } => Some(reason),
                    _ => None,
                })
                .collect()
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn report(&self, session_id: &str, diagnostic: Diagnostic<'_>) {
            let recorded = match diagnostic {
                Diagnostic::DecodeFailed(error) => Recorded::DecodeFailed(error.to_string()),
                Diagnostic::Discarded {
                    item_id, discard, ..
                } => Recorded::Discarded {
                    item_id: item_id.to_string(),
                    reason: discard.reason(),
                },
                Diagnostic::TurnIgnored(error) => Recorded::TurnIgnored(error.to_string()),
            };
            self.recorded
                .lock()
                .unwrap()
                .push((session_id.to_string(), recorded));
        }
    }
}
