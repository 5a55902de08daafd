//! An in-process managed system for exercising the console end to end.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use rand::RngCore;

use crate::algorithm::{
    AlgorithmKind, AuthenticationAlgorithm, CipherSuite, ConfidentialityAlgorithm,
    IntegrityAlgorithm,
};
use crate::confidentiality::{Cipher, new_cipher};
use crate::crypto::{SecretBytes, SessionKeys, ct_eq, normalize_key};
use crate::error::{Error, Result};
use crate::message::{CompletionCode, Message, SerializeOptions};
use crate::operation::Operation;
use crate::protocol::{
    IntegrityContext, RakpExchange, decode_rmcpplus_packet, encode_rmcpplus_packet, payload_type,
    status,
};
use crate::session::{Credentials, HandshakeConfig};
use crate::types::PrivilegeLevel;

pub(crate) const USERNAME: &[u8] = b"admin";
pub(crate) const PASSWORD: &[u8] = b"password";

pub(crate) fn credentials() -> Credentials {
    Credentials {
        username: USERNAME.to_vec(),
        password: SecretBytes::new(PASSWORD.to_vec()),
        bmc_key: None,
    }
}

pub(crate) fn handshake_config() -> HandshakeConfig {
    HandshakeConfig {
        credentials: credentials(),
        privilege: PrivilegeLevel::Administrator,
        cipher_suites: vec![CipherSuite::SUITE_17, CipherSuite::SUITE_3],
        timeout: Duration::from_millis(200),
        attempts: 1,
    }
}

/// How the fake mangles its replies to IPMI requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ResponseTweak {
    #[default]
    None,
    /// Answer with the request sequence number plus one.
    WrongSequence,
    /// Flip a bit of the integrity trailer.
    CorruptAuthCode,
    /// Queue each reply ahead of the ones still undelivered.
    NewestFirst,
    /// Never answer this request operation.
    Silent(Operation),
}

#[derive(Debug, Clone)]
pub(crate) struct FakeBmcOptions {
    pub password: Vec<u8>,
    pub bmc_key: Option<Vec<u8>>,
    pub max_privilege: PrivilegeLevel,
    pub accept_suites: Vec<CipherSuite>,
    /// Algorithm IDs to report in the Open Session Response instead of the
    /// offered ones.
    pub select: Option<[u8; 3]>,
    pub corrupt_rakp2: bool,
    pub corrupt_rakp4: bool,
    pub tweak: ResponseTweak,
}

impl Default for FakeBmcOptions {
    fn default() -> Self {
        let accept_suites = [0u8, 1, 2, 3, 15, 16, 17]
            .into_iter()
            .filter_map(|id| CipherSuite::from_id(id).ok())
            .collect();
        Self {
            password: PASSWORD.to_vec(),
            bmc_key: None,
            max_privilege: PrivilegeLevel::Administrator,
            accept_suites,
            select: None,
            corrupt_rakp2: false,
            corrupt_rakp4: false,
            tweak: ResponseTweak::None,
        }
    }
}

struct Pending {
    suite: CipherSuite,
    console_session_id: u32,
    console_random: [u8; 16],
    bmc_random: [u8; 16],
    role: u8,
    username: Vec<u8>,
}

struct Established {
    console_session_id: u32,
    integrity: Option<IntegrityContext>,
    cipher: Box<dyn Cipher>,
    next_seq: u32,
}

#[derive(Default)]
struct State {
    pending: Option<Pending>,
    session: Option<Established>,
    outbox: VecDeque<Vec<u8>>,
}

/// Managed system side of RMCP+, driven synchronously by whatever the
/// console sends.
pub(crate) struct FakeBmc {
    opts: FakeBmcOptions,
    state: Mutex<State>,
    ready: Condvar,
    closed: Arc<Mutex<Vec<u32>>>,
}

impl FakeBmc {
    pub(crate) const MANAGED_SESSION_ID: u32 = 0x0BAD_CAFE;
    pub(crate) const GUID: [u8; 16] = [
        0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xAB, 0xAC, 0xAD, 0xAE,
        0xAF,
    ];
    pub(crate) const DEVICE_ID: [u8; 15] = [
        0x20, 0x81, 0x02, 0x10, 0x02, 0xBF, 0x57, 0x01, 0x00, 0x34, 0x12, 0, 0, 0, 0,
    ];

    pub(crate) fn new(opts: FakeBmcOptions) -> Self {
        Self {
            opts,
            state: Mutex::new(State::default()),
            ready: Condvar::new(),
            closed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Session IDs named by every Close Session request served so far.
    pub(crate) fn closed_sessions(&self) -> Arc<Mutex<Vec<u32>>> {
        Arc::clone(&self.closed)
    }

    /// Answer one handshake packet. Empty when the packet deserves no reply.
    pub(crate) fn respond(&self, packet: &[u8]) -> Vec<u8> {
        self.handle(packet).expect("fake bmc").unwrap_or_default()
    }

    /// Verify and decrypt a session packet from the console.
    pub(crate) fn open_packet(&self, packet: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.lock().expect("fake bmc lock");
        open_with(state.session.as_ref(), packet)
    }

    /// Wrap `payload` the way the session `request` arrived on would.
    pub(crate) fn seal_reply(&self, request: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let mut state = self.state.lock().expect("fake bmc lock");
        let sessionless = request.get(6..10) == Some(&[0u8; 4][..]);
        seal_with(
            if sessionless {
                None
            } else {
                state.session.as_mut()
            },
            payload,
        )
    }

    fn handle(&self, packet: &[u8]) -> Result<Option<Vec<u8>>> {
        let decoded = match decode_rmcpplus_packet(packet, None) {
            Ok(decoded) => decoded,
            // Authenticated session traffic.
            Err(Error::Integrity(_)) => return self.serve_ipmi(packet),
            Err(err) => return Err(err),
        };

        match decoded.payload_type {
            payload_type::OPEN_SESSION_REQUEST => self.open_session(&decoded.payload).map(Some),
            payload_type::RAKP_1 => self.rakp1(&decoded.payload).map(Some),
            payload_type::RAKP_3 => self.rakp3(&decoded.payload).map(Some),
            payload_type::IPMI => self.serve_ipmi(packet),
            _ => Err(Error::Protocol("fake bmc: unexpected payload type")),
        }
    }

    fn open_session(&self, p: &[u8]) -> Result<Vec<u8>> {
        if p.len() < 32 {
            return Err(Error::Truncated("open session request"));
        }
        let tag = p[0];
        let requested = p[1] & 0x0F;
        let console_sid = u32::from_le_bytes([p[4], p[5], p[6], p[7]]);
        let offered = CipherSuite {
            authentication: AuthenticationAlgorithm::try_from(p[12] & 0x3F)?,
            integrity: IntegrityAlgorithm::try_from(p[20] & 0x3F)?,
            confidentiality: ConfidentialityAlgorithm::try_from(p[28] & 0x3F)?,
        };

        let reject = |code: u8| {
            let mut out = vec![tag, code, 0, 0];
            out.extend_from_slice(&console_sid.to_le_bytes());
            handshake_packet(payload_type::OPEN_SESSION_RESPONSE, &out)
        };
        if !self.opts.accept_suites.contains(&offered) {
            return reject(status::NO_CIPHER_SUITE_MATCH);
        }
        if requested > self.opts.max_privilege.as_u8() {
            return reject(status::INVALID_ROLE);
        }

        let [auth, integ, conf] = self.opts.select.unwrap_or([
            offered.authentication.id(),
            offered.integrity.id(),
            offered.confidentiality.id(),
        ]);

        let mut out = vec![tag, status::SUCCESS, self.opts.max_privilege.as_u8(), 0];
        out.extend_from_slice(&console_sid.to_le_bytes());
        out.extend_from_slice(&Self::MANAGED_SESSION_ID.to_le_bytes());
        for (kind, id) in [
            (AlgorithmKind::Authentication, auth),
            (AlgorithmKind::Integrity, integ),
            (AlgorithmKind::Confidentiality, conf),
        ] {
            out.extend_from_slice(&[kind.block_type(), 0, 0, 8, id, 0, 0, 0]);
        }

        let mut state = self.state.lock().expect("fake bmc lock");
        state.pending = Some(Pending {
            suite: offered,
            console_session_id: console_sid,
            console_random: [0; 16],
            bmc_random: [0; 16],
            role: 0,
            username: Vec::new(),
        });
        handshake_packet(payload_type::OPEN_SESSION_RESPONSE, &out)
    }

    fn rakp1(&self, p: &[u8]) -> Result<Vec<u8>> {
        if p.len() < 28 {
            return Err(Error::Truncated("rakp 1"));
        }
        let mut state = self.state.lock().expect("fake bmc lock");
        let pending = state
            .pending
            .as_mut()
            .ok_or(Error::Protocol("fake bmc: rakp 1 before open session"))?;

        let tag = p[0];
        let managed_sid = u32::from_le_bytes([p[4], p[5], p[6], p[7]]);
        if managed_sid != Self::MANAGED_SESSION_ID {
            return Err(Error::Protocol("fake bmc: rakp 1 for an unknown session"));
        }
        pending.console_random.copy_from_slice(&p[8..24]);
        pending.role = p[24];
        let ulen = p[27] as usize;
        pending.username = p
            .get(28..28 + ulen)
            .ok_or(Error::Truncated("rakp 1 username"))?
            .to_vec();
        rand::rng().fill_bytes(&mut pending.bmc_random);

        let user_key = normalize_key(&self.opts.password);
        let mut code = exchange(pending).rakp2_auth_code(&user_key)?;
        if self.opts.corrupt_rakp2 {
            if let Some(b) = code.first_mut() {
                *b ^= 0xFF;
            }
        }

        let mut out = vec![tag, status::SUCCESS, 0, 0];
        out.extend_from_slice(&pending.console_session_id.to_le_bytes());
        out.extend_from_slice(&pending.bmc_random);
        out.extend_from_slice(&Self::GUID);
        out.extend_from_slice(&code);
        handshake_packet(payload_type::RAKP_2, &out)
    }

    fn rakp3(&self, p: &[u8]) -> Result<Vec<u8>> {
        if p.len() < 8 {
            return Err(Error::Truncated("rakp 3"));
        }
        let mut state = self.state.lock().expect("fake bmc lock");
        let pending = state
            .pending
            .take()
            .ok_or(Error::Protocol("fake bmc: rakp 3 before rakp 1"))?;

        let tag = p[0];
        let user_key = normalize_key(&self.opts.password);
        let exchange = exchange(&pending);
        let expected = exchange.rakp3_auth_code(&user_key)?;

        let mut out = vec![tag, status::SUCCESS, 0, 0];
        out.extend_from_slice(&pending.console_session_id.to_le_bytes());
        if !ct_eq(&expected, &p[8..]) {
            out[1] = status::INVALID_INTEGRITY_CHECK_VALUE;
            return handshake_packet(payload_type::RAKP_4, &out);
        }

        let bmc_key = normalize_key(self.opts.bmc_key.as_deref().unwrap_or(&self.opts.password[..]));
        let sik = exchange.session_integrity_key(&bmc_key)?;
        let mut icv = exchange.rakp4_integrity_check_value(&sik)?;
        if self.opts.corrupt_rakp4 {
            if let Some(b) = icv.first_mut() {
                *b ^= 0xFF;
            }
        }
        out.extend_from_slice(&icv);

        let keys = SessionKeys::new(pending.suite.authentication, sik);
        state.session = Some(Established {
            console_session_id: pending.console_session_id,
            integrity: IntegrityContext::derive(pending.suite.integrity, &keys)?,
            cipher: new_cipher(pending.suite.confidentiality, &keys)?,
            next_seq: 1,
        });
        handshake_packet(payload_type::RAKP_4, &out)
    }

    fn serve_ipmi(&self, packet: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().expect("fake bmc lock");
        let sessionless = packet.get(6..10) == Some(&[0u8; 4][..]);
        let inner = if sessionless {
            open_with(None, packet)?
        } else {
            open_with(state.session.as_ref(), packet)?
        };
        let request = Message::decode(&inner)?;

        if self.opts.tweak == ResponseTweak::Silent(request.operation) {
            return Ok(None);
        }

        let (completion_code, data) = self.execute(&request);
        let sequence = match self.opts.tweak {
            ResponseTweak::WrongSequence => (request.sequence + 1) & 0x3F,
            _ => request.sequence,
        };
        let mut response = Message {
            operation: request.operation.response(),
            remote_address: request.local_address,
            remote_lun: request.local_lun,
            checksum1: 0,
            local_address: request.remote_address,
            local_lun: request.remote_lun,
            sequence,
            completion_code,
            checksum2: 0,
            payload: data,
        };
        let bytes = response.encode(SerializeOptions::COMPUTE_CHECKSUMS)?;

        let mut reply = if sessionless {
            seal_with(None, &bytes)?
        } else {
            seal_with(state.session.as_mut(), &bytes)?
        };
        if self.opts.tweak == ResponseTweak::CorruptAuthCode {
            if let Some(b) = reply.last_mut() {
                *b ^= 0x01;
            }
        }

        if request.operation == Operation::CLOSE_SESSION_REQ && completion_code.is_normal() {
            state.session = None;
        }
        Ok(Some(reply))
    }

    fn execute(&self, request: &Message) -> (CompletionCode, Vec<u8>) {
        match request.operation {
            Operation::GET_DEVICE_ID_REQ => (CompletionCode::NORMAL, Self::DEVICE_ID.to_vec()),
            Operation::GET_SYSTEM_GUID_REQ => (CompletionCode::NORMAL, Self::GUID.to_vec()),
            Operation::GET_CHASSIS_STATUS_REQ => {
                (CompletionCode::NORMAL, vec![0x21, 0x10, 0x00, 0x00])
            }
            Operation::CHASSIS_CONTROL_REQ if request.payload.len() == 1 => {
                (CompletionCode::NORMAL, Vec::new())
            }
            Operation::CHASSIS_CONTROL_REQ => {
                (CompletionCode::REQUEST_DATA_LENGTH_INVALID, Vec::new())
            }
            Operation::GET_CHANNEL_AUTH_CAPABILITIES_REQ => (
                CompletionCode::NORMAL,
                vec![0x01, 0x80, 0x04, 0x02, 0x00, 0x00, 0x00, 0x00],
            ),
            Operation::CLOSE_SESSION_REQ => match request.payload.get(..4) {
                Some(sid) => {
                    let sid = u32::from_le_bytes([sid[0], sid[1], sid[2], sid[3]]);
                    self.closed.lock().expect("fake bmc lock").push(sid);
                    if sid == Self::MANAGED_SESSION_ID {
                        (CompletionCode::NORMAL, Vec::new())
                    } else {
                        (CompletionCode::INVALID_SESSION_ID, Vec::new())
                    }
                }
                None => (CompletionCode::REQUEST_DATA_LENGTH_INVALID, Vec::new()),
            },
            _ => (CompletionCode::INVALID_COMMAND, Vec::new()),
        }
    }

    fn enqueue(&self, reply: Vec<u8>) {
        let mut state = self.state.lock().expect("fake bmc lock");
        if self.opts.tweak == ResponseTweak::NewestFirst {
            state.outbox.push_front(reply);
        } else {
            state.outbox.push_back(reply);
        }
        self.ready.notify_all();
    }

    fn next_reply(&self, deadline: Instant) -> Result<Vec<u8>> {
        let mut state = self.state.lock().expect("fake bmc lock");
        loop {
            if let Some(reply) = state.outbox.pop_front() {
                return Ok(reply);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            state = self
                .ready
                .wait_timeout(state, deadline - now)
                .expect("fake bmc lock")
                .0;
        }
    }

    fn accept(&self, datagram: &[u8]) {
        // A real BMC silently drops what it cannot use.
        if let Ok(Some(reply)) = self.handle(datagram) {
            self.enqueue(reply);
        }
    }
}

fn exchange(pending: &Pending) -> RakpExchange<'_> {
    RakpExchange {
        algorithm: pending.suite.authentication,
        remote_console_session_id: pending.console_session_id,
        managed_system_session_id: FakeBmc::MANAGED_SESSION_ID,
        console_random: &pending.console_random,
        bmc_random: &pending.bmc_random,
        bmc_guid: &FakeBmc::GUID,
        role: pending.role,
        username: &pending.username,
    }
}

fn handshake_packet(payload_type_num: u8, payload: &[u8]) -> Result<Vec<u8>> {
    encode_rmcpplus_packet(payload_type_num, 0, 0, payload, false, None)
}

fn open_with(session: Option<&Established>, packet: &[u8]) -> Result<Vec<u8>> {
    let Some(session) = session else {
        return Ok(decode_rmcpplus_packet(packet, None)?.payload);
    };
    let decoded = decode_rmcpplus_packet(packet, session.integrity.as_ref())?;
    if decoded.session_id != FakeBmc::MANAGED_SESSION_ID {
        return Err(Error::Protocol("fake bmc: wrong session id"));
    }
    if decoded.encrypted {
        session.cipher.decrypt(&decoded.payload)
    } else {
        Ok(decoded.payload)
    }
}

fn seal_with(session: Option<&mut Established>, payload: &[u8]) -> Result<Vec<u8>> {
    let Some(session) = session else {
        return encode_rmcpplus_packet(payload_type::IPMI, 0, 0, payload, false, None);
    };
    let encrypted = session.cipher.algorithm() != ConfidentialityAlgorithm::None;
    let body = if encrypted {
        session.cipher.encrypt(payload)?
    } else {
        payload.to_vec()
    };
    let seq = session.next_seq;
    session.next_seq += 1;
    encode_rmcpplus_packet(
        payload_type::IPMI,
        session.console_session_id,
        seq,
        &body,
        encrypted,
        session.integrity.as_ref(),
    )
}

#[cfg(feature = "blocking")]
impl crate::transport::Transport for FakeBmc {
    fn send(&self, datagram: &[u8]) -> Result<()> {
        self.accept(datagram);
        Ok(())
    }

    fn recv(&self, deadline: Instant) -> Result<Vec<u8>> {
        self.next_reply(deadline)
    }
}

#[cfg(feature = "async")]
impl crate::transport::AsyncTransport for FakeBmc {
    fn send<'a>(&'a self, datagram: &'a [u8]) -> crate::transport::TransportFuture<'a, ()> {
        Box::pin(async move {
            self.accept(datagram);
            Ok(())
        })
    }

    fn recv(&self, deadline: Instant) -> crate::transport::TransportFuture<'_, Vec<u8>> {
        Box::pin(async move {
            loop {
                let probe = Instant::now().min(deadline);
                match self.next_reply(probe) {
                    Err(Error::Timeout) if Instant::now() < deadline => {
                        tokio::time::sleep(Duration::from_millis(2)).await;
                    }
                    other => return other,
                }
            }
        })
    }
}
