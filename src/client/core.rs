use crate::error::{Error, Result};
use crate::message::{Address, Message, SerializeOptions};
use crate::operation::Operation;
use crate::session::{Session, SessionState};
use crate::types::RawResponse;

const SEQUENCE_SLOTS: usize = 64;

/// Outstanding 6-bit IPMI request sequence numbers.
///
/// Each reserved number remembers the response operation it expects.
#[derive(Debug)]
pub(crate) struct SequencePool {
    outstanding: [Option<Operation>; SEQUENCE_SLOTS],
    next: u8,
}

impl SequencePool {
    pub(crate) fn new() -> Self {
        Self {
            outstanding: [None; SEQUENCE_SLOTS],
            next: 0,
        }
    }

    /// Hand out the next free number after the last one issued.
    pub(crate) fn reserve(&mut self, expected: Operation) -> Result<u8> {
        for offset in 0..SEQUENCE_SLOTS as u8 {
            let seq = self.next.wrapping_add(offset) & 0x3F;
            let slot = &mut self.outstanding[seq as usize];
            if slot.is_none() {
                *slot = Some(expected);
                self.next = (seq + 1) & 0x3F;
                return Ok(seq);
            }
        }
        Err(Error::Protocol("all 64 request sequence numbers are outstanding"))
    }

    pub(crate) fn expected(&self, seq: u8) -> Option<Operation> {
        self.outstanding[(seq & 0x3F) as usize]
    }

    pub(crate) fn release(&mut self, seq: u8) {
        self.outstanding[(seq & 0x3F) as usize] = None;
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.iter().filter(|s| s.is_some()).count()
    }
}

/// Session plus request bookkeeping, shared by the blocking and tokio
/// clients behind their lock.
#[derive(Debug)]
pub(crate) struct ClientCore {
    session: Session,
    sequences: SequencePool,
}

impl ClientCore {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session,
            sequences: SequencePool::new(),
        }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.session.state() == SessionState::Closed
    }

    pub(crate) fn mark_closed(&mut self) {
        self.session.close();
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.sequences.outstanding()
    }

    /// Reserve a sequence number and produce the sealed request datagram.
    pub(crate) fn build_request(&mut self, operation: Operation, data: &[u8]) -> Result<(u8, Vec<u8>)> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        if !operation.function.is_request() {
            return Err(Error::InvalidArgument("operation is not a request"));
        }

        let seq = self.sequences.reserve(operation.response())?;
        let sealed = Message::request(operation, seq, data.to_vec())
            .encode(SerializeOptions::COMPUTE_CHECKSUMS)
            .and_then(|bytes| {
                crate::debug::dump_hex("ipmi request", &bytes);
                self.session.seal(&bytes)
            });
        match sealed {
            Ok(packet) => Ok((seq, packet)),
            Err(err) => {
                self.sequences.release(seq);
                Err(err)
            }
        }
    }

    /// Unwrap an inbound datagram and match it to an outstanding request.
    ///
    /// `Ok(None)` means the datagram was well formed but nobody is waiting
    /// for it; it is dropped.
    pub(crate) fn accept_response(&mut self, datagram: &[u8]) -> Result<Option<(u8, RawResponse)>> {
        let bytes = self.session.unseal(datagram)?;
        crate::debug::dump_hex("ipmi response", &bytes);
        let message = Message::decode(&bytes)?;

        if message.is_request() || message.remote_address != Address::REMOTE_CONSOLE {
            log_dropped(&message, "not a response addressed to this console");
            return Ok(None);
        }

        let seq = message.sequence;
        match self.sequences.expected(seq) {
            Some(expected) if expected == message.operation => {
                self.sequences.release(seq);
                Ok(Some((
                    seq,
                    RawResponse {
                        completion_code: message.completion_code,
                        layer: message.next_layer(),
                        data: message.payload,
                    },
                )))
            }
            Some(_) => {
                log_dropped(&message, "operation does not match the outstanding request");
                Ok(None)
            }
            None => {
                log_dropped(&message, "no outstanding request with this sequence");
                Ok(None)
            }
        }
    }

    pub(crate) fn release(&mut self, seq: u8) {
        self.sequences.release(seq);
    }
}

fn log_dropped(message: &Message, reason: &'static str) {
    #[cfg(feature = "tracing")]
    tracing::debug!(
        sequence = message.sequence,
        operation = %message.operation,
        reason,
        "dropping ipmi message"
    );
    let _ = (message, reason);
}

/// Log a datagram the reader could not use. Never fatal to the waiting call.
pub(crate) fn log_undecodable(err: &Error) {
    #[cfg(feature = "tracing")]
    {
        if err.is_dropped_message() {
            tracing::debug!(error = %err, "dropping inbound datagram");
        } else {
            tracing::warn!(error = %err, "dropping unexpected inbound datagram");
        }
    }
    let _ = err;
}
