//! RMCP+ session establishment (RAKP) and per-packet protection.
//!
//! [`Handshake`] is a pure state machine: it turns inbound handshake
//! datagrams into the next outbound one and never touches a socket. The
//! `establish_session*` drivers pair it with a transport.

use std::time::{Duration, Instant};

use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::algorithm::{
    AuthenticationAlgorithm, CipherSuite, ConfidentialityAlgorithm, IntegrityAlgorithm,
};
use crate::confidentiality::{Cipher, NoConfidentiality, new_cipher};
use crate::crypto::{KEY_LEN, SecretBytes, SessionKeys, ct_eq};
use crate::error::{Error, Result};
use crate::protocol::{
    IntegrityContext, MAX_USERNAME_LEN, RakpExchange, build_open_session_request_payload,
    build_rakp_message_1_payload, build_rakp_message_3_payload, decode_rmcpplus_packet,
    encode_rmcpplus_packet, parse_open_session_response_payload, parse_rakp_message_2_payload,
    parse_rakp_message_4_payload, payload_type, status,
};
#[cfg(feature = "blocking")]
use crate::transport::Transport;
use crate::types::PrivilegeLevel;

/// Lifecycle of an RMCP+ session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing sent yet.
    Unestablished,
    /// Open Session Request sent.
    OpeningSession,
    /// RAKP Message 1 sent.
    AwaitingRakp2,
    /// RAKP Message 3 sent.
    AwaitingRakp4,
    /// Handshake complete; application traffic allowed.
    Active,
    /// Closed or aborted. Terminal.
    Closed,
}

/// Login material for RAKP.
#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub(crate) username: Vec<u8>,
    pub(crate) password: SecretBytes,
    pub(crate) bmc_key: Option<SecretBytes>,
}

/// Session establishment parameters shared by the drivers.
#[derive(Debug, Clone)]
pub(crate) struct HandshakeConfig {
    pub(crate) credentials: Credentials,
    pub(crate) privilege: PrivilegeLevel,
    pub(crate) cipher_suites: Vec<CipherSuite>,
    /// Per handshake message.
    pub(crate) timeout: Duration,
    /// Sends per handshake message before giving up.
    pub(crate) attempts: u32,
}

/// Console side of the RAKP handshake.
pub(crate) struct Handshake {
    state: SessionState,
    privilege: PrivilegeLevel,
    suite: CipherSuite,
    username: Vec<u8>,
    user_key: Zeroizing<[u8; KEY_LEN]>,
    bmc_key: Zeroizing<[u8; KEY_LEN]>,
    console_session_id: u32,
    managed_session_id: u32,
    message_tag: u8,
    console_random: [u8; 16],
    bmc_random: [u8; 16],
    bmc_guid: [u8; 16],
    keys: Option<SessionKeys>,
    integrity: Option<IntegrityContext>,
    cipher: Option<Box<dyn Cipher>>,
}

impl Handshake {
    pub(crate) fn new(
        credentials: &Credentials,
        privilege: PrivilegeLevel,
        suite: CipherSuite,
    ) -> Result<Self> {
        if credentials.username.len() > MAX_USERNAME_LEN {
            return Err(Error::InvalidArgument("username too long (max 16 bytes)"));
        }
        if !suite.is_consistent() {
            return Err(Error::InvalidArgument(
                "cipher suite needs an authentication algorithm for its keys",
            ));
        }

        let user_key = credentials.password.to_key();
        // K_G defaults to K_UID when the BMC has no two-key login configured.
        let bmc_key = match &credentials.bmc_key {
            Some(kg) => kg.to_key(),
            None => user_key.clone(),
        };

        Ok(Self {
            state: SessionState::Unestablished,
            privilege,
            suite,
            username: credentials.username.clone(),
            user_key,
            bmc_key,
            console_session_id: 0,
            managed_session_id: 0,
            message_tag: 0,
            console_random: [0u8; 16],
            bmc_random: [0u8; 16],
            bmc_guid: [0u8; 16],
            keys: None,
            integrity: None,
            cipher: None,
        })
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn console_session_id(&self) -> u32 {
        self.console_session_id
    }

    /// Start the handshake: `Unestablished → OpeningSession`.
    pub(crate) fn open_session_request(&mut self) -> Result<Vec<u8>> {
        self.step(SessionState::Unestablished, |hs| {
            let mut rng = rand::rng();
            // Zero is reserved for sessionless traffic.
            hs.console_session_id = rng.next_u32().max(1);
            hs.message_tag = next_tag(hs.message_tag);

            let payload = build_open_session_request_payload(
                hs.message_tag,
                hs.privilege,
                hs.console_session_id,
                &hs.suite,
            );
            let packet = encode_rmcpplus_packet(
                payload_type::OPEN_SESSION_REQUEST,
                0,
                0,
                &payload,
                false,
                None,
            )?;
            hs.state = SessionState::OpeningSession;
            Ok(packet)
        })
    }

    /// Validate the Open Session Response and produce RAKP 1:
    /// `OpeningSession → AwaitingRakp2`.
    pub(crate) fn handle_open_session_response(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.step(SessionState::OpeningSession, |hs| {
            let payload = handshake_payload(bytes, payload_type::OPEN_SESSION_RESPONSE)?;
            let response = parse_open_session_response_payload(&payload)?;

            if response.message_tag != hs.message_tag {
                return Err(Error::Protocol("Open Session response message tag mismatch"));
            }
            if response.status_code != status::SUCCESS {
                return Err(Error::OpenSessionRejected {
                    status: response.status_code,
                });
            }
            if response.remote_console_session_id != hs.console_session_id {
                return Err(Error::Protocol("Open Session remote session id mismatch"));
            }

            let selected = CipherSuite {
                authentication: AuthenticationAlgorithm::try_from(
                    response.selected_auth_algorithm,
                )?,
                integrity: IntegrityAlgorithm::try_from(response.selected_integrity_algorithm)?,
                confidentiality: ConfidentialityAlgorithm::try_from(
                    response.selected_confidentiality_algorithm,
                )?,
            };
            if selected != hs.suite {
                return Err(Error::Negotiation(
                    "managed system selected algorithms that were not offered",
                ));
            }
            if response.managed_system_session_id == 0 {
                return Err(Error::Protocol("managed system session id is zero"));
            }
            hs.managed_session_id = response.managed_system_session_id;

            let granted = response.max_privilege_level;
            #[cfg(feature = "tracing")]
            tracing::debug!(
                requested = %hs.privilege,
                max_privilege = granted,
                managed_session_id = hs.managed_session_id,
                "rmcp+ open session accepted"
            );
            let _ = granted;

            rand::rng().fill_bytes(&mut hs.console_random);
            hs.message_tag = next_tag(hs.message_tag);

            let payload = build_rakp_message_1_payload(
                hs.message_tag,
                hs.managed_session_id,
                &hs.console_random,
                hs.role(),
                &hs.username,
            )?;
            let packet =
                encode_rmcpplus_packet(payload_type::RAKP_1, 0, 0, &payload, false, None)?;
            hs.state = SessionState::AwaitingRakp2;
            Ok(packet)
        })
    }

    /// Verify RAKP 2, derive the session keys and produce RAKP 3:
    /// `AwaitingRakp2 → AwaitingRakp4`.
    pub(crate) fn handle_rakp2(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.step(SessionState::AwaitingRakp2, |hs| {
            let payload = handshake_payload(bytes, payload_type::RAKP_2)?;
            let rakp2 = parse_rakp_message_2_payload(&payload, hs.suite.authentication)?;

            if rakp2.message_tag != hs.message_tag {
                return Err(Error::Protocol("RAKP message 2 tag mismatch"));
            }
            if rakp2.status_code != status::SUCCESS {
                return Err(Error::Authentication(rakp_status_reason(rakp2.status_code)));
            }
            if rakp2.remote_console_session_id != hs.console_session_id {
                return Err(Error::Protocol("RAKP message 2 remote session id mismatch"));
            }

            hs.bmc_random = rakp2.bmc_random;
            hs.bmc_guid = rakp2.bmc_guid;

            let exchange = hs.exchange();
            let expected = exchange.rakp2_auth_code(hs.user_key.as_slice())?;
            if !ct_eq(&expected, &rakp2.key_exchange_auth_code) {
                return Err(Error::Authentication(
                    "RAKP message 2 authentication code mismatch",
                ));
            }

            let sik = exchange.session_integrity_key(hs.bmc_key.as_slice())?;
            let rakp3_code = exchange.rakp3_auth_code(hs.user_key.as_slice())?;

            // Unsupported integrity/confidentiality keying surfaces here,
            // before the session can carry traffic.
            let keys = SessionKeys::new(hs.suite.authentication, sik);
            hs.integrity = IntegrityContext::derive(hs.suite.integrity, &keys)?;
            hs.cipher = Some(new_cipher(hs.suite.confidentiality, &keys)?);
            hs.keys = Some(keys);

            hs.message_tag = next_tag(hs.message_tag);
            let payload =
                build_rakp_message_3_payload(hs.message_tag, hs.managed_session_id, &rakp3_code);
            let packet =
                encode_rmcpplus_packet(payload_type::RAKP_3, 0, 0, &payload, false, None)?;
            hs.state = SessionState::AwaitingRakp4;
            Ok(packet)
        })
    }

    /// Verify RAKP 4 and activate the session: `AwaitingRakp4 → Active`.
    pub(crate) fn handle_rakp4(&mut self, bytes: &[u8]) -> Result<Session> {
        self.step(SessionState::AwaitingRakp4, |hs| {
            let payload = handshake_payload(bytes, payload_type::RAKP_4)?;
            let rakp4 = parse_rakp_message_4_payload(&payload, hs.suite.authentication)?;

            if rakp4.message_tag != hs.message_tag {
                return Err(Error::Protocol("RAKP message 4 tag mismatch"));
            }
            if rakp4.status_code != status::SUCCESS {
                return Err(Error::Authentication(rakp_status_reason(rakp4.status_code)));
            }
            if rakp4.remote_console_session_id != hs.console_session_id {
                return Err(Error::Protocol("RAKP message 4 remote session id mismatch"));
            }

            let keys = hs
                .keys
                .as_ref()
                .ok_or(Error::Protocol("session keys missing after RAKP 2"))?;
            let expected = hs.exchange().rakp4_integrity_check_value(keys.sik())?;
            if !ct_eq(&expected, &rakp4.integrity_check_value) {
                return Err(Error::Authentication(
                    "RAKP message 4 integrity check value mismatch",
                ));
            }

            let cipher = hs
                .cipher
                .take()
                .ok_or(Error::Protocol("cipher missing after RAKP 2"))?;
            hs.keys = None;
            hs.state = SessionState::Active;

            Ok(Session {
                managed_session_id: hs.managed_session_id,
                console_session_id: hs.console_session_id,
                privilege: Some(hs.privilege),
                suite: hs.suite,
                bmc_guid: hs.bmc_guid,
                integrity: hs.integrity.take(),
                cipher,
                next_out_seq: 1,
                last_in_seq: None,
                state: SessionState::Active,
            })
        })
    }

    /// Discard all handshake state. Later calls fail with `SessionClosed`.
    pub(crate) fn abort(&mut self) {
        self.state = SessionState::Closed;
        self.keys = None;
        self.integrity = None;
        self.cipher = None;
        self.user_key.zeroize();
        self.bmc_key.zeroize();
        self.console_random.zeroize();
        self.bmc_random.zeroize();
    }

    fn step<T>(
        &mut self,
        expected: SessionState,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        if self.state != expected {
            return Err(Error::Protocol("handshake message out of order"));
        }

        let result = f(self);
        if let Err(err) = &result {
            #[cfg(feature = "tracing")]
            tracing::debug!(state = ?expected, error = %err, "rmcp+ handshake aborted");
            let _ = err;
            self.abort();
        }
        result
    }

    // Role byte for RAKP 1 and the key exchange codes. Bit 4 clear requests
    // a username/privilege lookup.
    fn role(&self) -> u8 {
        self.privilege.as_u8() & 0x0F
    }

    fn exchange(&self) -> RakpExchange<'_> {
        RakpExchange {
            algorithm: self.suite.authentication,
            remote_console_session_id: self.console_session_id,
            managed_system_session_id: self.managed_session_id,
            console_random: &self.console_random,
            bmc_random: &self.bmc_random,
            bmc_guid: &self.bmc_guid,
            role: self.role(),
            username: &self.username,
        }
    }
}

impl core::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handshake")
            .field("state", &self.state)
            .field("privilege", &self.privilege)
            .field("suite", &self.suite)
            .field("console_session_id", &self.console_session_id)
            .field("managed_session_id", &self.managed_session_id)
            .finish_non_exhaustive()
    }
}

fn next_tag(previous: u8) -> u8 {
    let mut tag = (rand::rng().next_u32() & 0xFF) as u8;
    if tag == previous {
        tag = tag.wrapping_add(1);
    }
    tag
}

fn handshake_payload(bytes: &[u8], expected_type: u8) -> Result<Vec<u8>> {
    let decoded = decode_rmcpplus_packet(bytes, None)?;
    if decoded.payload_type != expected_type {
        return Err(Error::Protocol("unexpected handshake payload type"));
    }
    Ok(decoded.payload)
}

fn rakp_status_reason(code: u8) -> &'static str {
    match code {
        status::UNAUTHORIZED_NAME => "managed system rejected the username",
        status::INVALID_INTEGRITY_CHECK_VALUE => "managed system rejected our key exchange code",
        status::INVALID_ROLE => "managed system rejected the requested role",
        status::INVALID_SESSION_ID => "managed system reported an invalid session id",
        _ => "managed system reported a RAKP failure status",
    }
}

/// An active RMCP+ session, or the sessionless channel.
pub(crate) struct Session {
    managed_session_id: u32,
    console_session_id: u32,
    privilege: Option<PrivilegeLevel>,
    suite: CipherSuite,
    bmc_guid: [u8; 16],
    integrity: Option<IntegrityContext>,
    cipher: Box<dyn Cipher>,
    next_out_seq: u32,
    last_in_seq: Option<u32>,
    state: SessionState,
}

impl Session {
    /// Session ID 0, sequence 0, no protection.
    pub(crate) fn sessionless() -> Self {
        Self {
            managed_session_id: 0,
            console_session_id: 0,
            privilege: None,
            suite: CipherSuite {
                authentication: AuthenticationAlgorithm::None,
                integrity: IntegrityAlgorithm::None,
                confidentiality: ConfidentialityAlgorithm::None,
            },
            bmc_guid: [0u8; 16],
            integrity: None,
            cipher: Box::new(NoConfidentiality),
            next_out_seq: 0,
            last_in_seq: None,
            state: SessionState::Active,
        }
    }

    pub(crate) fn is_sessionless(&self) -> bool {
        self.managed_session_id == 0
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn managed_session_id(&self) -> u32 {
        self.managed_session_id
    }

    pub(crate) fn privilege(&self) -> Option<PrivilegeLevel> {
        self.privilege
    }

    pub(crate) fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub(crate) fn bmc_guid(&self) -> [u8; 16] {
        self.bmc_guid
    }

    #[cfg(test)]
    pub(crate) fn last_inbound_sequence(&self) -> Option<u32> {
        self.last_in_seq
    }

    /// Wrap an encoded IPMI message for the wire.
    pub(crate) fn seal(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        if self.state != SessionState::Active {
            return Err(Error::SessionClosed);
        }

        let encrypted = self.cipher.algorithm() != ConfidentialityAlgorithm::None;
        let payload = if encrypted {
            self.cipher.encrypt(message)?
        } else {
            message.to_vec()
        };

        let session_seq = self.allocate_out_seq();
        encode_rmcpplus_packet(
            payload_type::IPMI,
            self.managed_session_id,
            session_seq,
            &payload,
            encrypted,
            self.integrity.as_ref(),
        )
    }

    /// Verify and unwrap an inbound datagram into an encoded IPMI message.
    ///
    /// Integrity is checked before decryption.
    pub(crate) fn unseal(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        if self.state != SessionState::Active {
            return Err(Error::SessionClosed);
        }

        let decoded = decode_rmcpplus_packet(bytes, self.integrity.as_ref())?;
        if decoded.payload_type != payload_type::IPMI {
            return Err(Error::Protocol("unexpected RMCP+ payload type"));
        }

        // Some implementations echo either session ID in the header.
        if !self.is_sessionless()
            && decoded.session_id != self.console_session_id
            && decoded.session_id != self.managed_session_id
        {
            return Err(Error::Protocol("unexpected RMCP+ session id"));
        }

        let confidential = self.cipher.algorithm() != ConfidentialityAlgorithm::None;
        let message = match (confidential, decoded.encrypted) {
            (true, true) => self.cipher.decrypt(&decoded.payload)?,
            (false, false) => decoded.payload,
            (true, false) => {
                return Err(Error::Integrity("packet lacks the negotiated encryption"));
            }
            (false, true) => return Err(Error::Protocol("unexpected encrypted payload")),
        };

        self.last_in_seq = Some(decoded.session_seq);
        Ok(message)
    }

    /// Mark the session closed and drop its keys.
    pub(crate) fn close(&mut self) {
        self.state = SessionState::Closed;
        self.integrity = None;
        self.cipher = Box::new(NoConfidentiality);
    }

    fn allocate_out_seq(&mut self) -> u32 {
        if self.is_sessionless() {
            return 0;
        }
        let current = self.next_out_seq;
        self.next_out_seq = match self.next_out_seq.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        current
    }

    #[cfg(test)]
    pub(crate) fn set_next_out_seq(&mut self, seq: u32) {
        self.next_out_seq = seq;
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("managed_session_id", &self.managed_session_id)
            .field("console_session_id", &self.console_session_id)
            .field("privilege", &self.privilege)
            .field("suite", &self.suite)
            .field("integrity", &self.integrity.as_ref().map(|i| i.algorithm()))
            .field("confidentiality", &self.cipher.algorithm())
            .field("next_out_seq", &self.next_out_seq)
            .field("state", &self.state)
            .finish()
    }
}

/// Outcome of one handshake attempt, as seen by the fallback loop.
enum Fallback {
    NextSuite(Error),
    NextPrivilege(Error),
}

fn classify(err: Error) -> core::result::Result<Fallback, Error> {
    match err {
        Error::OpenSessionRejected {
            status: status::NO_CIPHER_SUITE_MATCH,
        } => Ok(Fallback::NextSuite(err)),
        Error::OpenSessionRejected {
            status: status::INVALID_ROLE,
        } => Ok(Fallback::NextPrivilege(err)),
        other => Err(other),
    }
}

fn log_established(config: &HandshakeConfig, session: &Session) {
    #[cfg(feature = "tracing")]
    {
        if session.privilege != Some(config.privilege) {
            tracing::info!(
                requested = %config.privilege,
                granted = ?session.privilege,
                "rmcp+ session opened with downgraded privilege"
            );
        }
        tracing::debug!(
            managed_session_id = session.managed_session_id,
            suite = ?session.suite,
            "rmcp+ session established"
        );
    }
    let _ = (config, session);
}

#[cfg(feature = "blocking")]
pub(crate) fn establish_session<T: Transport + ?Sized>(
    transport: &T,
    config: &HandshakeConfig,
) -> Result<Session> {
    let mut last_err = Error::Negotiation("no cipher suites configured");

    'privilege: for &privilege in config.privilege.fallback_candidates() {
        for &suite in &config.cipher_suites {
            let mut handshake = Handshake::new(&config.credentials, privilege, suite)?;
            match run_handshake(transport, &mut handshake, config) {
                Ok(session) => {
                    log_established(config, &session);
                    return Ok(session);
                }
                Err(err) => match classify(err)? {
                    Fallback::NextSuite(err) => last_err = err,
                    Fallback::NextPrivilege(err) => {
                        last_err = err;
                        continue 'privilege;
                    }
                },
            }
        }
    }

    Err(last_err)
}

#[cfg(feature = "blocking")]
fn run_handshake<T: Transport + ?Sized>(
    transport: &T,
    handshake: &mut Handshake,
    config: &HandshakeConfig,
) -> Result<Session> {
    let result = (|| {
        let request = handshake.open_session_request()?;
        let response = exchange(transport, &request, config, "open session")?;
        let rakp1 = handshake.handle_open_session_response(&response)?;
        let response = exchange(transport, &rakp1, config, "rakp1")?;
        let rakp3 = handshake.handle_rakp2(&response)?;
        let response = exchange(transport, &rakp3, config, "rakp3")?;
        handshake.handle_rakp4(&response)
    })();
    if result.is_err() && handshake.state() != SessionState::Closed {
        handshake.abort();
    }
    result
}

#[cfg(feature = "blocking")]
fn exchange<T: Transport + ?Sized>(
    transport: &T,
    request: &[u8],
    config: &HandshakeConfig,
    label: &'static str,
) -> Result<Vec<u8>> {
    let attempts = config.attempts.max(1);
    for attempt in 1..=attempts {
        crate::debug::dump_hex(label, request);
        transport.send(request)?;
        match transport.recv(Instant::now() + config.timeout) {
            Ok(response) => {
                crate::debug::dump_hex(label, &response);
                return Ok(response);
            }
            Err(Error::Timeout) if attempt < attempts => continue,
            Err(err) => return Err(err),
        }
    }
    Err(Error::Timeout)
}

#[cfg(feature = "async")]
pub(crate) async fn establish_session_async<T: crate::transport::AsyncTransport + ?Sized>(
    transport: &T,
    config: &HandshakeConfig,
) -> Result<Session> {
    let mut last_err = Error::Negotiation("no cipher suites configured");

    'privilege: for &privilege in config.privilege.fallback_candidates() {
        for &suite in &config.cipher_suites {
            let mut handshake = Handshake::new(&config.credentials, privilege, suite)?;
            match run_handshake_async(transport, &mut handshake, config).await {
                Ok(session) => {
                    log_established(config, &session);
                    return Ok(session);
                }
                Err(err) => match classify(err)? {
                    Fallback::NextSuite(err) => last_err = err,
                    Fallback::NextPrivilege(err) => {
                        last_err = err;
                        continue 'privilege;
                    }
                },
            }
        }
    }

    Err(last_err)
}

#[cfg(feature = "async")]
async fn run_handshake_async<T: crate::transport::AsyncTransport + ?Sized>(
    transport: &T,
    handshake: &mut Handshake,
    config: &HandshakeConfig,
) -> Result<Session> {
    let result = async {
        let request = handshake.open_session_request()?;
        let response = exchange_async(transport, &request, config, "open session").await?;
        let rakp1 = handshake.handle_open_session_response(&response)?;
        let response = exchange_async(transport, &rakp1, config, "rakp1").await?;
        let rakp3 = handshake.handle_rakp2(&response)?;
        let response = exchange_async(transport, &rakp3, config, "rakp3").await?;
        handshake.handle_rakp4(&response)
    }
    .await;
    if result.is_err() && handshake.state() != SessionState::Closed {
        handshake.abort();
    }
    result
}

#[cfg(feature = "async")]
async fn exchange_async<T: crate::transport::AsyncTransport + ?Sized>(
    transport: &T,
    request: &[u8],
    config: &HandshakeConfig,
    label: &'static str,
) -> Result<Vec<u8>> {
    let attempts = config.attempts.max(1);
    for attempt in 1..=attempts {
        crate::debug::dump_hex(label, request);
        transport.send(request).await?;
        match transport.recv(Instant::now() + config.timeout).await {
            Ok(response) => {
                crate::debug::dump_hex(label, &response);
                return Ok(response);
            }
            Err(Error::Timeout) if attempt < attempts => continue,
            Err(err) => return Err(err),
        }
    }
    Err(Error::Timeout)
}
