use zeroize::Zeroizing;

use crate::algorithm::{AlgorithmKind, AuthenticationAlgorithm, CipherSuite, IntegrityAlgorithm};
use crate::confidentiality::AdditionalKeyMaterialGenerator;
use crate::crypto::{auth_hmac, ct_eq, integrity_hmac};
use crate::error::{Error, Result};
use crate::types::PrivilegeLevel;

/// RMCP header values.
const RMCP_VERSION: u8 = 0x06;
const RMCP_RESERVED: u8 = 0x00;
const RMCP_SEQ_NO_ACK: u8 = 0xFF;
const RMCP_CLASS_IPMI: u8 = 0x07;

/// RMCP+ session auth type/format.
const RMCPPLUS_AUTH_TYPE: u8 = 0x06;

/// RMCP+ session trailer next header value.
const RMCPPLUS_NEXT_HEADER: u8 = 0x07;

/// RMCP header plus RMCP+ session header.
pub(crate) const HEADER_LEN: usize = 4 + 12;

/// Largest username RAKP 1 can carry.
pub(crate) const MAX_USERNAME_LEN: usize = 16;

/// Payload type numbers (see IPMI v2.0 Table 13-16).
pub(crate) mod payload_type {
    /// Standard IPMI payload (lan message) wrapped in RMCP+.
    pub const IPMI: u8 = 0x00;
    /// OEM explicit payload.
    pub const OEM_EXPLICIT: u8 = 0x02;
    /// RMCP+ Open Session Request.
    pub const OPEN_SESSION_REQUEST: u8 = 0x10;
    /// RMCP+ Open Session Response.
    pub const OPEN_SESSION_RESPONSE: u8 = 0x11;
    /// RAKP Message 1.
    pub const RAKP_1: u8 = 0x12;
    /// RAKP Message 2.
    pub const RAKP_2: u8 = 0x13;
    /// RAKP Message 3.
    pub const RAKP_3: u8 = 0x14;
    /// RAKP Message 4.
    pub const RAKP_4: u8 = 0x15;
}

/// RMCP+ status codes (IPMI v2.0 Table 13-15) the handshake reacts to.
pub(crate) mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const INVALID_SESSION_ID: u8 = 0x02;
    pub const UNAUTHORIZED_NAME: u8 = 0x0D;
    pub const INVALID_INTEGRITY_CHECK_VALUE: u8 = 0x0F;
    pub const NO_CIPHER_SUITE_MATCH: u8 = 0x11;
    pub const INVALID_ROLE: u8 = 0x12;
}

/// Integrity keying for an established session: the algorithm plus K1.
pub(crate) struct IntegrityContext {
    algorithm: IntegrityAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl IntegrityContext {
    /// Derive the integrity context from the session key material.
    ///
    /// Returns `None` when no integrity algorithm was negotiated.
    pub(crate) fn derive(
        algorithm: IntegrityAlgorithm,
        keys: &dyn AdditionalKeyMaterialGenerator,
    ) -> Result<Option<Self>> {
        if algorithm == IntegrityAlgorithm::None {
            return Ok(None);
        }
        let key = keys.k(1)?;
        if key.is_empty() {
            // RAKP-none yields no key material.
            return Err(Error::UnsupportedAlgorithm {
                kind: AlgorithmKind::Integrity,
                id: algorithm.id(),
            });
        }
        Ok(Some(Self { algorithm, key }))
    }

    pub(crate) fn algorithm(&self) -> IntegrityAlgorithm {
        self.algorithm
    }

    pub(crate) fn auth_code_len(&self) -> usize {
        self.algorithm.auth_code_len()
    }

    fn compute(&self, data: &[u8]) -> Result<Vec<u8>> {
        integrity_hmac(self.algorithm, &self.key, data)
    }
}

impl core::fmt::Debug for IntegrityContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntegrityContext")
            .field("algorithm", &self.algorithm)
            .field("key", &"<secret>")
            .finish()
    }
}

/// Parsed RMCP+ packet. The payload is still encrypted if `encrypted` is set.
#[derive(Debug, Clone)]
pub(crate) struct DecodedPacket {
    pub payload_type: u8,
    pub encrypted: bool,
    pub session_id: u32,
    pub session_seq: u32,
    pub payload: Vec<u8>,
}

/// Frame a payload in the RMCP and RMCP+ session headers.
///
/// An integrity context makes the packet authenticated and appends the
/// session trailer.
pub(crate) fn encode_rmcpplus_packet(
    payload_type_num: u8,
    session_id: u32,
    session_seq: u32,
    payload: &[u8],
    encrypted: bool,
    integrity: Option<&IntegrityContext>,
) -> Result<Vec<u8>> {
    let payload_type_byte =
        make_payload_type_byte(payload_type_num, integrity.is_some(), encrypted);

    let payload_len: u16 = payload
        .len()
        .try_into()
        .map_err(|_| Error::InvalidArgument("payload too large"))?;

    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len() + 32);

    // RMCP header.
    packet.push(RMCP_VERSION);
    packet.push(RMCP_RESERVED);
    packet.push(RMCP_SEQ_NO_ACK);
    packet.push(RMCP_CLASS_IPMI);

    // RMCP+ session header.
    packet.push(RMCPPLUS_AUTH_TYPE);
    packet.push(payload_type_byte);
    packet.extend_from_slice(&session_id.to_le_bytes());
    packet.extend_from_slice(&session_seq.to_le_bytes());
    packet.extend_from_slice(&payload_len.to_le_bytes());

    packet.extend_from_slice(payload);

    if let Some(integrity) = integrity {
        // Integrity padding aligns the authenticated range to 4 bytes.
        let base_len = 12usize + payload.len() + 2;
        let pad_len = ((4 - (base_len % 4)) % 4) as u8;

        packet.extend(std::iter::repeat_n(0xFF, pad_len as usize));
        packet.push(pad_len);
        packet.push(RMCPPLUS_NEXT_HEADER);

        let auth_code = integrity.compute(&packet[4..])?;
        packet.extend_from_slice(&auth_code);
    }

    Ok(packet)
}

/// Parse an RMCP+ packet, verifying the session trailer when present.
///
/// With an integrity context, unauthenticated packets are rejected. Without
/// one, authenticated packets are rejected since they cannot be verified.
pub(crate) fn decode_rmcpplus_packet(
    bytes: &[u8],
    integrity: Option<&IntegrityContext>,
) -> Result<DecodedPacket> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Truncated("RMCP+ packet shorter than its headers"));
    }

    if bytes[0] != RMCP_VERSION {
        return Err(Error::Protocol("unexpected RMCP version"));
    }
    if bytes[3] != RMCP_CLASS_IPMI {
        return Err(Error::Protocol("unexpected RMCP class"));
    }
    if bytes[4] != RMCPPLUS_AUTH_TYPE {
        return Err(Error::Protocol("unsupported RMCP auth type"));
    }

    let (authenticated, encrypted, payload_type) = split_payload_type(bytes[5]);
    if payload_type == payload_type::OEM_EXPLICIT {
        return Err(Error::Protocol("OEM explicit payload is not supported"));
    }

    let session_id = read_u32_le(&bytes[6..10]);
    let session_seq = read_u32_le(&bytes[10..14]);
    let payload_len = u16::from_le_bytes([bytes[14], bytes[15]]) as usize;

    let payload_end = HEADER_LEN + payload_len;
    if bytes.len() < payload_end {
        return Err(Error::Truncated("RMCP+ payload"));
    }

    match (authenticated, integrity) {
        (true, Some(integrity)) => verify_trailer(bytes, payload_end, integrity)?,
        (true, None) => {
            return Err(Error::Integrity(
                "authenticated packet outside an integrity-protected session",
            ));
        }
        (false, Some(_)) => {
            return Err(Error::Integrity("packet lacks the negotiated integrity trailer"));
        }
        (false, None) => {}
    }

    Ok(DecodedPacket {
        payload_type,
        encrypted,
        session_id,
        session_seq,
        payload: bytes[HEADER_LEN..payload_end].to_vec(),
    })
}

fn verify_trailer(bytes: &[u8], payload_end: usize, integrity: &IntegrityContext) -> Result<()> {
    let auth_code_len = integrity.auth_code_len();
    if bytes.len() < payload_end + 2 + auth_code_len {
        return Err(Error::Truncated("RMCP+ session trailer"));
    }

    // The authenticated range runs from AuthType (byte 4) through Next Header.
    let auth_code_start = bytes.len() - auth_code_len;
    let expected = integrity.compute(&bytes[4..auth_code_start])?;
    if !ct_eq(&bytes[auth_code_start..], &expected) {
        return Err(Error::Integrity("invalid packet auth code"));
    }

    // Trailer layout: [integrity pad bytes][pad_len][next_header]
    let pad_len = bytes[auth_code_start - 2] as usize;
    let next_header = bytes[auth_code_start - 1];
    if next_header != RMCPPLUS_NEXT_HEADER {
        return Err(Error::Integrity("unexpected next header"));
    }

    let pad_bytes = &bytes[payload_end..auth_code_start - 2];
    if pad_bytes.len() != pad_len {
        return Err(Error::Integrity("pad length mismatch"));
    }
    if pad_bytes.iter().any(|&b| b != 0xFF) {
        return Err(Error::Integrity("invalid integrity pad bytes"));
    }

    Ok(())
}

fn make_payload_type_byte(payload_type_num: u8, authenticated: bool, encrypted: bool) -> u8 {
    let mut b = payload_type_num & 0x3F;
    if authenticated {
        b |= 0x40;
    }
    if encrypted {
        b |= 0x80;
    }
    b
}

fn split_payload_type(payload_type_byte: u8) -> (bool, bool, u8) {
    let is_encrypted = (payload_type_byte & 0x80) != 0;
    let is_authenticated = (payload_type_byte & 0x40) != 0;
    let payload_type_num = payload_type_byte & 0x3F;
    (is_authenticated, is_encrypted, payload_type_num)
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[..N]);
    buf
}

/// Build the Open Session Request payload (Table 13-9).
pub(crate) fn build_open_session_request_payload(
    message_tag: u8,
    requested_privilege: PrivilegeLevel,
    remote_console_session_id: u32,
    suite: &CipherSuite,
) -> Vec<u8> {
    let mut p = Vec::with_capacity(32);

    p.push(message_tag);
    p.push(requested_privilege.as_u8() & 0x0F);
    p.extend_from_slice(&[0x00, 0x00]);
    p.extend_from_slice(&remote_console_session_id.to_le_bytes());

    p.extend_from_slice(&build_algorithm_proposal(
        AlgorithmKind::Authentication,
        suite.authentication.id(),
    ));
    p.extend_from_slice(&build_algorithm_proposal(
        AlgorithmKind::Integrity,
        suite.integrity.id(),
    ));
    p.extend_from_slice(&build_algorithm_proposal(
        AlgorithmKind::Confidentiality,
        suite.confidentiality.id(),
    ));

    debug_assert_eq!(p.len(), 32);
    p
}

fn build_algorithm_proposal(kind: AlgorithmKind, algorithm: u8) -> [u8; 8] {
    [
        kind.block_type(),
        0x00,
        0x00,
        0x08,
        algorithm & 0x3F,
        0x00,
        0x00,
        0x00,
    ]
}

#[derive(Debug, Clone)]
pub(crate) struct OpenSessionResponse {
    pub message_tag: u8,
    pub status_code: u8,
    pub max_privilege_level: u8,
    pub remote_console_session_id: u32,
    pub managed_system_session_id: u32,
    pub selected_auth_algorithm: u8,
    pub selected_integrity_algorithm: u8,
    pub selected_confidentiality_algorithm: u8,
}

pub(crate) fn parse_open_session_response_payload(payload: &[u8]) -> Result<OpenSessionResponse> {
    if payload.len() < 8 {
        return Err(Error::Truncated("Open Session Response"));
    }

    let message_tag = payload[0];
    let status_code = payload[1];
    let max_privilege_level = payload[2] & 0x0F;
    let remote_console_session_id = read_u32_le(&payload[4..8]);

    if status_code != status::SUCCESS {
        return Ok(OpenSessionResponse {
            message_tag,
            status_code,
            max_privilege_level,
            remote_console_session_id,
            managed_system_session_id: 0,
            selected_auth_algorithm: 0,
            selected_integrity_algorithm: 0,
            selected_confidentiality_algorithm: 0,
        });
    }

    if payload.len() < 36 {
        return Err(Error::Truncated("Open Session Response"));
    }

    // Selected algorithms are encoded in byte 5 of each 8-byte block.
    Ok(OpenSessionResponse {
        message_tag,
        status_code,
        max_privilege_level,
        remote_console_session_id,
        managed_system_session_id: read_u32_le(&payload[8..12]),
        selected_auth_algorithm: payload[12 + 4] & 0x3F,
        selected_integrity_algorithm: payload[20 + 4] & 0x3F,
        selected_confidentiality_algorithm: payload[28 + 4] & 0x3F,
    })
}

/// Build RAKP Message 1 payload (Table 13-11).
pub(crate) fn build_rakp_message_1_payload(
    message_tag: u8,
    managed_system_session_id: u32,
    console_random: &[u8; 16],
    role: u8,
    username: &[u8],
) -> Result<Vec<u8>> {
    if username.len() > MAX_USERNAME_LEN {
        return Err(Error::InvalidArgument("username too long (max 16 bytes)"));
    }

    let mut p = Vec::with_capacity(28 + username.len());

    p.push(message_tag);
    p.extend_from_slice(&[0x00, 0x00, 0x00]);
    p.extend_from_slice(&managed_system_session_id.to_le_bytes());
    p.extend_from_slice(console_random);
    p.push(role);
    p.extend_from_slice(&[0x00, 0x00]);
    p.push(username.len() as u8);
    p.extend_from_slice(username);

    Ok(p)
}

#[derive(Debug, Clone)]
pub(crate) struct RakpMessage2 {
    pub message_tag: u8,
    pub status_code: u8,
    pub remote_console_session_id: u32,
    pub bmc_random: [u8; 16],
    pub bmc_guid: [u8; 16],
    pub key_exchange_auth_code: Vec<u8>,
}

pub(crate) fn parse_rakp_message_2_payload(
    payload: &[u8],
    algorithm: AuthenticationAlgorithm,
) -> Result<RakpMessage2> {
    if payload.len() < 8 {
        return Err(Error::Truncated("RAKP message 2"));
    }

    let message_tag = payload[0];
    let status_code = payload[1];
    let remote_console_session_id = read_u32_le(&payload[4..8]);

    if status_code != status::SUCCESS {
        return Ok(RakpMessage2 {
            message_tag,
            status_code,
            remote_console_session_id,
            bmc_random: [0u8; 16],
            bmc_guid: [0u8; 16],
            key_exchange_auth_code: Vec::new(),
        });
    }

    let code_len = algorithm.auth_code_len();
    if payload.len() < 40 + code_len {
        return Err(Error::Truncated("RAKP message 2"));
    }

    Ok(RakpMessage2 {
        message_tag,
        status_code,
        remote_console_session_id,
        bmc_random: read_array(&payload[8..24]),
        bmc_guid: read_array(&payload[24..40]),
        key_exchange_auth_code: payload[40..40 + code_len].to_vec(),
    })
}

/// Build RAKP Message 3 payload (Table 13-13).
pub(crate) fn build_rakp_message_3_payload(
    message_tag: u8,
    managed_system_session_id: u32,
    key_exchange_auth_code: &[u8],
) -> Vec<u8> {
    let mut p = Vec::with_capacity(8 + key_exchange_auth_code.len());
    p.push(message_tag);
    p.push(status::SUCCESS);
    p.extend_from_slice(&[0x00, 0x00]);
    p.extend_from_slice(&managed_system_session_id.to_le_bytes());
    p.extend_from_slice(key_exchange_auth_code);
    p
}

#[derive(Debug, Clone)]
pub(crate) struct RakpMessage4 {
    pub message_tag: u8,
    pub status_code: u8,
    pub remote_console_session_id: u32,
    pub integrity_check_value: Vec<u8>,
}

pub(crate) fn parse_rakp_message_4_payload(
    payload: &[u8],
    algorithm: AuthenticationAlgorithm,
) -> Result<RakpMessage4> {
    if payload.len() < 8 {
        return Err(Error::Truncated("RAKP message 4"));
    }

    let message_tag = payload[0];
    let status_code = payload[1];
    let remote_console_session_id = read_u32_le(&payload[4..8]);

    if status_code != status::SUCCESS {
        return Ok(RakpMessage4 {
            message_tag,
            status_code,
            remote_console_session_id,
            integrity_check_value: Vec::new(),
        });
    }

    let icv_len = algorithm.icv_len();
    if payload.len() < 8 + icv_len {
        return Err(Error::Truncated("RAKP message 4"));
    }

    Ok(RakpMessage4 {
        message_tag,
        status_code,
        remote_console_session_id,
        integrity_check_value: payload[8..8 + icv_len].to_vec(),
    })
}

/// Inputs shared by the RAKP key exchange computations.
pub(crate) struct RakpExchange<'a> {
    pub algorithm: AuthenticationAlgorithm,
    pub remote_console_session_id: u32,
    pub managed_system_session_id: u32,
    pub console_random: &'a [u8; 16],
    pub bmc_random: &'a [u8; 16],
    pub bmc_guid: &'a [u8; 16],
    pub role: u8,
    pub username: &'a [u8],
}

impl RakpExchange<'_> {
    /// RAKP 2 code: HMAC(K_UID, SIDm | SIDc | Rm | Rc | GUIDc | Role | ULen | UName).
    pub(crate) fn rakp2_auth_code(&self, user_key: &[u8]) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(58 + self.username.len());
        data.extend_from_slice(&self.remote_console_session_id.to_le_bytes());
        data.extend_from_slice(&self.managed_system_session_id.to_le_bytes());
        data.extend_from_slice(self.console_random);
        data.extend_from_slice(self.bmc_random);
        data.extend_from_slice(self.bmc_guid);
        self.push_identity(&mut data);
        auth_hmac(self.algorithm, user_key, &data)
    }

    /// SIK: HMAC(K_G, Rm | Rc | Role | ULen | UName), no truncation.
    pub(crate) fn session_integrity_key(&self, bmc_key: &[u8]) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(34 + self.username.len());
        data.extend_from_slice(self.console_random);
        data.extend_from_slice(self.bmc_random);
        self.push_identity(&mut data);
        auth_hmac(self.algorithm, bmc_key, &data)
    }

    /// RAKP 3 code: HMAC(K_UID, Rc | SIDm | Role | ULen | UName).
    pub(crate) fn rakp3_auth_code(&self, user_key: &[u8]) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(22 + self.username.len());
        data.extend_from_slice(self.bmc_random);
        data.extend_from_slice(&self.remote_console_session_id.to_le_bytes());
        self.push_identity(&mut data);
        auth_hmac(self.algorithm, user_key, &data)
    }

    /// RAKP 4 ICV: HMAC(SIK, Rm | SIDc | GUIDc), truncated per algorithm.
    pub(crate) fn rakp4_integrity_check_value(&self, sik: &[u8]) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(self.console_random);
        data.extend_from_slice(&self.managed_system_session_id.to_le_bytes());
        data.extend_from_slice(self.bmc_guid);
        let mut icv = auth_hmac(self.algorithm, sik, &data)?;
        icv.truncate(self.algorithm.icv_len());
        Ok(icv)
    }

    fn push_identity(&self, data: &mut Vec<u8>) {
        data.push(self.role);
        data.push(self.username.len() as u8);
        data.extend_from_slice(self.username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedK1;

    impl AdditionalKeyMaterialGenerator for FixedK1 {
        fn k(&self, n: u8) -> Result<Zeroizing<Vec<u8>>> {
            Ok(Zeroizing::new(vec![n; 20]))
        }
    }

    fn integrity() -> IntegrityContext {
        IntegrityContext::derive(IntegrityAlgorithm::HmacSha1_96, &FixedK1)
            .expect("derive")
            .expect("some")
    }

    #[test]
    fn sessionless_packet_layout() {
        let packet =
            encode_rmcpplus_packet(payload_type::IPMI, 0, 0, &[0xAA, 0xBB], false, None)
                .expect("encode");
        assert_eq!(
            packet,
            [
                0x06, 0x00, 0xFF, 0x07, 0x06, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0x02, 0x00, 0xAA,
                0xBB,
            ]
        );

        let decoded = decode_rmcpplus_packet(&packet, None).expect("decode");
        assert_eq!(decoded.payload_type, payload_type::IPMI);
        assert!(!decoded.encrypted);
        assert_eq!(decoded.payload, [0xAA, 0xBB]);
    }

    #[test]
    fn authenticated_packet_round_trips_and_aligns() {
        let ctx = integrity();
        for len in 0..8 {
            let payload = vec![0x5A; len];
            let packet = encode_rmcpplus_packet(
                payload_type::IPMI,
                0x0102_0304,
                7,
                &payload,
                true,
                Some(&ctx),
            )
            .expect("encode");
            assert_eq!(packet[5], 0xC0);
            assert_eq!((packet.len() - 4 - 12) % 4, 0);

            let decoded = decode_rmcpplus_packet(&packet, Some(&ctx)).expect("decode");
            assert!(decoded.encrypted);
            assert_eq!(decoded.session_id, 0x0102_0304);
            assert_eq!(decoded.session_seq, 7);
            assert_eq!(decoded.payload, payload);
        }
    }

    #[test]
    fn tampered_packet_fails_integrity() {
        let ctx = integrity();
        let mut packet =
            encode_rmcpplus_packet(payload_type::IPMI, 1, 2, b"hello", false, Some(&ctx))
                .expect("encode");
        packet[HEADER_LEN] ^= 0x01;
        assert!(matches!(
            decode_rmcpplus_packet(&packet, Some(&ctx)),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn missing_protection_is_rejected() {
        let ctx = integrity();
        let plain =
            encode_rmcpplus_packet(payload_type::IPMI, 1, 2, b"hello", false, None).expect("encode");
        assert!(matches!(
            decode_rmcpplus_packet(&plain, Some(&ctx)),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn short_packets_are_truncated() {
        let packet =
            encode_rmcpplus_packet(payload_type::IPMI, 0, 0, &[1, 2, 3], false, None)
                .expect("encode");
        assert!(matches!(
            decode_rmcpplus_packet(&packet[..10], None),
            Err(Error::Truncated(_))
        ));
        assert!(matches!(
            decode_rmcpplus_packet(&packet[..packet.len() - 1], None),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn open_session_request_layout() {
        let p = build_open_session_request_payload(
            0x42,
            PrivilegeLevel::Operator,
            0xA0A1_A2A3,
            &CipherSuite::SUITE_17,
        );
        assert_eq!(p[..8], [0x42, 0x03, 0x00, 0x00, 0xA3, 0xA2, 0xA1, 0xA0]);
        assert_eq!(p[8..16], [0x00, 0, 0, 0x08, 0x03, 0, 0, 0]);
        assert_eq!(p[16..24], [0x01, 0, 0, 0x08, 0x04, 0, 0, 0]);
        assert_eq!(p[24..32], [0x02, 0, 0, 0x08, 0x01, 0, 0, 0]);
    }

    #[test]
    fn rejected_open_session_parses_short_form() {
        let payload = [0x42, status::INVALID_ROLE, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let parsed = parse_open_session_response_payload(&payload).expect("parse");
        assert_eq!(parsed.status_code, status::INVALID_ROLE);
        assert_eq!(parsed.remote_console_session_id, 1);

        let mut ok = payload;
        ok[1] = status::SUCCESS;
        assert!(matches!(
            parse_open_session_response_payload(&ok),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn accepted_open_session_reports_selection() {
        let mut payload = vec![0x07, status::SUCCESS, 0x83, 0x00, 0x01, 0x00, 0x00, 0x00];
        payload.extend_from_slice(&0x0B0C_0D0Eu32.to_le_bytes());
        payload.extend_from_slice(&[0x00, 0, 0, 0x08, 0x03, 0, 0, 0]);
        payload.extend_from_slice(&[0x01, 0, 0, 0x08, 0x04, 0, 0, 0]);
        payload.extend_from_slice(&[0x02, 0, 0, 0x08, 0x01, 0, 0, 0]);

        let parsed = parse_open_session_response_payload(&payload).expect("parse");
        assert_eq!(parsed.max_privilege_level, 0x03);
        assert_eq!(parsed.managed_system_session_id, 0x0B0C_0D0E);
        assert_eq!(
            (
                parsed.selected_auth_algorithm,
                parsed.selected_integrity_algorithm,
                parsed.selected_confidentiality_algorithm
            ),
            (0x03, 0x04, 0x01)
        );
    }

    #[test]
    fn rakp2_code_length_follows_algorithm() {
        let mut payload = vec![0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00];
        payload.extend_from_slice(&[0x11; 16]);
        payload.extend_from_slice(&[0x22; 16]);
        payload.extend_from_slice(&[0x33; 20]);

        let sha1 = parse_rakp_message_2_payload(&payload, AuthenticationAlgorithm::HmacSha1)
            .expect("sha1");
        assert_eq!(sha1.key_exchange_auth_code.len(), 20);
        assert_eq!(sha1.bmc_guid, [0x22; 16]);

        assert!(matches!(
            parse_rakp_message_2_payload(&payload, AuthenticationAlgorithm::HmacSha256),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn rakp4_icv_is_truncated() {
        let rm = [1u8; 16];
        let rc = [2u8; 16];
        let guid = [3u8; 16];
        for (algorithm, len) in [
            (AuthenticationAlgorithm::None, 0),
            (AuthenticationAlgorithm::HmacSha1, 12),
            (AuthenticationAlgorithm::HmacSha256, 16),
        ] {
            let exchange = RakpExchange {
                algorithm,
                remote_console_session_id: 1,
                managed_system_session_id: 2,
                console_random: &rm,
                bmc_random: &rc,
                bmc_guid: &guid,
                role: 0x04,
                username: b"admin",
            };
            let icv = exchange.rakp4_integrity_check_value(&[9u8; 20]).expect("icv");
            assert_eq!(icv.len(), len);
        }
    }
}
