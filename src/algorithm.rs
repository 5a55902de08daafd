//! RMCP+ algorithm identifiers and cipher suites (IPMI v2.0 §13.28).

use core::fmt;

use crate::error::{Error, Result};

/// The three algorithm classes negotiated in Open Session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    /// RAKP authentication.
    Authentication,
    /// Per-packet integrity.
    Integrity,
    /// Payload confidentiality.
    Confidentiality,
}

impl AlgorithmKind {
    /// Payload type byte used in the Open Session algorithm blocks.
    pub(crate) const fn block_type(self) -> u8 {
        match self {
            Self::Authentication => 0x00,
            Self::Integrity => 0x01,
            Self::Confidentiality => 0x02,
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => f.write_str("authentication"),
            Self::Integrity => f.write_str("integrity"),
            Self::Confidentiality => f.write_str("confidentiality"),
        }
    }
}

/// RAKP authentication algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationAlgorithm {
    /// RAKP-none: no authentication codes.
    None,
    /// RAKP-HMAC-SHA1.
    HmacSha1,
    /// RAKP-HMAC-SHA256.
    HmacSha256,
}

impl AuthenticationAlgorithm {
    /// Wire identifier.
    pub const fn id(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::HmacSha1 => 0x01,
            Self::HmacSha256 => 0x03,
        }
    }

    /// Length of the RAKP 2/3 key exchange authentication code.
    pub const fn auth_code_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::HmacSha1 => 20,
            Self::HmacSha256 => 32,
        }
    }

    /// Length of the RAKP 4 integrity check value.
    pub const fn icv_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::HmacSha1 => 12,
            Self::HmacSha256 => 16,
        }
    }
}

impl TryFrom<u8> for AuthenticationAlgorithm {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id & 0x3F {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::HmacSha1),
            0x03 => Ok(Self::HmacSha256),
            other => Err(Error::UnsupportedAlgorithm {
                kind: AlgorithmKind::Authentication,
                id: other,
            }),
        }
    }
}

/// Per-packet integrity algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityAlgorithm {
    /// No integrity trailer.
    None,
    /// HMAC-SHA1-96.
    HmacSha1_96,
    /// HMAC-SHA256-128.
    HmacSha256_128,
}

impl IntegrityAlgorithm {
    /// Wire identifier.
    pub const fn id(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::HmacSha1_96 => 0x01,
            Self::HmacSha256_128 => 0x04,
        }
    }

    /// Length of the AuthCode field in the session trailer.
    pub const fn auth_code_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::HmacSha1_96 => 12,
            Self::HmacSha256_128 => 16,
        }
    }
}

impl TryFrom<u8> for IntegrityAlgorithm {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id & 0x3F {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::HmacSha1_96),
            0x04 => Ok(Self::HmacSha256_128),
            other => Err(Error::UnsupportedAlgorithm {
                kind: AlgorithmKind::Integrity,
                id: other,
            }),
        }
    }
}

/// Payload confidentiality algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidentialityAlgorithm {
    /// Payloads travel in the clear.
    None,
    /// AES-CBC-128.
    AesCbc128,
}

impl ConfidentialityAlgorithm {
    /// Wire identifier.
    pub const fn id(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::AesCbc128 => 0x01,
        }
    }
}

impl TryFrom<u8> for ConfidentialityAlgorithm {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id & 0x3F {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::AesCbc128),
            other => Err(Error::UnsupportedAlgorithm {
                kind: AlgorithmKind::Confidentiality,
                id: other,
            }),
        }
    }
}

/// A negotiated or proposed algorithm triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    /// RAKP authentication algorithm.
    pub authentication: AuthenticationAlgorithm,
    /// Integrity algorithm.
    pub integrity: IntegrityAlgorithm,
    /// Confidentiality algorithm.
    pub confidentiality: ConfidentialityAlgorithm,
}

impl CipherSuite {
    /// Suite 3: RAKP-HMAC-SHA1, HMAC-SHA1-96, AES-CBC-128.
    pub const SUITE_3: Self = Self {
        authentication: AuthenticationAlgorithm::HmacSha1,
        integrity: IntegrityAlgorithm::HmacSha1_96,
        confidentiality: ConfidentialityAlgorithm::AesCbc128,
    };

    /// Suite 17: RAKP-HMAC-SHA256, HMAC-SHA256-128, AES-CBC-128.
    pub const SUITE_17: Self = Self {
        authentication: AuthenticationAlgorithm::HmacSha256,
        integrity: IntegrityAlgorithm::HmacSha256_128,
        confidentiality: ConfidentialityAlgorithm::AesCbc128,
    };

    /// Look up a standard cipher suite ID.
    pub fn from_id(id: u8) -> Result<Self> {
        use AuthenticationAlgorithm as A;
        use ConfidentialityAlgorithm as C;
        use IntegrityAlgorithm as I;

        let (authentication, integrity, confidentiality) = match id {
            0 => (A::None, I::None, C::None),
            1 => (A::HmacSha1, I::None, C::None),
            2 => (A::HmacSha1, I::HmacSha1_96, C::None),
            3 => (A::HmacSha1, I::HmacSha1_96, C::AesCbc128),
            15 => (A::HmacSha256, I::None, C::None),
            16 => (A::HmacSha256, I::HmacSha256_128, C::None),
            17 => (A::HmacSha256, I::HmacSha256_128, C::AesCbc128),
            _ => return Err(Error::InvalidArgument("unsupported cipher suite ID")),
        };
        Ok(Self {
            authentication,
            integrity,
            confidentiality,
        })
    }

    /// Integrity and confidentiality keys come from the SIK, so they need an
    /// authentication algorithm.
    pub fn is_consistent(&self) -> bool {
        self.authentication != AuthenticationAlgorithm::None
            || (self.integrity == IntegrityAlgorithm::None
                && self.confidentiality == ConfidentialityAlgorithm::None)
    }
}
