//! Payload confidentiality (IPMI v2.0 §13.29).
//!
//! A [`Cipher`] only ever sees the IPMI payload carried between the RMCP+
//! session header and the integrity trailer.

use rand::RngCore;
use zeroize::Zeroizing;

use crate::algorithm::{AlgorithmKind, ConfidentialityAlgorithm};
use crate::crypto::{aes128_cbc_decrypt, aes128_cbc_encrypt};
use crate::error::{Error, Result};

const AES_BLOCK_LEN: usize = 16;

/// Source of additional key material `K(n)` for an established session.
pub trait AdditionalKeyMaterialGenerator {
    /// Derive `K(n)`.
    fn k(&self, n: u8) -> Result<Zeroizing<Vec<u8>>>;
}

/// Whole-buffer payload encryption.
pub trait Cipher: Send + Sync {
    /// The algorithm this cipher implements.
    fn algorithm(&self) -> ConfidentialityAlgorithm;

    /// Encrypt a plaintext payload.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a ciphertext payload.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Construct the cipher for a negotiated algorithm identifier.
///
/// Fails with [`Error::UnsupportedAlgorithm`] for identifiers this crate
/// does not implement.
pub fn cipher_for_id(
    id: u8,
    keys: &dyn AdditionalKeyMaterialGenerator,
) -> Result<Box<dyn Cipher>> {
    new_cipher(ConfidentialityAlgorithm::try_from(id)?, keys)
}

/// Construct the cipher for a negotiated algorithm.
pub fn new_cipher(
    algorithm: ConfidentialityAlgorithm,
    keys: &dyn AdditionalKeyMaterialGenerator,
) -> Result<Box<dyn Cipher>> {
    match algorithm {
        ConfidentialityAlgorithm::None => Ok(Box::new(NoConfidentiality)),
        ConfidentialityAlgorithm::AesCbc128 => {
            let k2 = keys.k(2)?;
            if k2.len() < AES_BLOCK_LEN {
                // RAKP-none yields no key material.
                return Err(Error::UnsupportedAlgorithm {
                    kind: AlgorithmKind::Confidentiality,
                    id: algorithm.id(),
                });
            }
            let mut key = [0u8; AES_BLOCK_LEN];
            key.copy_from_slice(&k2[..AES_BLOCK_LEN]);
            Ok(Box::new(Aes128Cbc::new(key)))
        }
    }
}

/// Identity transform, used when no confidentiality is negotiated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfidentiality;

impl Cipher for NoConfidentiality {
    fn algorithm(&self) -> ConfidentialityAlgorithm {
        ConfidentialityAlgorithm::None
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}

/// AES-CBC-128 with a random per-message IV and IPMI confidentiality padding.
///
/// Output layout: `IV (16) || AES-CBC(payload || 1, 2, .., n || n)`.
pub struct Aes128Cbc {
    key: Zeroizing<[u8; AES_BLOCK_LEN]>,
}

impl Aes128Cbc {
    /// Create a cipher from a 16-byte key.
    pub fn new(key: [u8; AES_BLOCK_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    pub(crate) fn encrypt_with_iv(
        &self,
        plaintext: &[u8],
        iv: &[u8; AES_BLOCK_LEN],
    ) -> Result<Vec<u8>> {
        let base = plaintext.len() + 1;
        let pad_len = (AES_BLOCK_LEN - (base % AES_BLOCK_LEN)) % AES_BLOCK_LEN;

        let mut to_encrypt = Zeroizing::new(Vec::with_capacity(base + pad_len));
        to_encrypt.extend_from_slice(plaintext);
        to_encrypt.extend((1..=pad_len).map(|i| i as u8));
        to_encrypt.push(pad_len as u8);

        let ciphertext = aes128_cbc_encrypt(&self.key, iv, &to_encrypt)?;

        let mut out = Vec::with_capacity(AES_BLOCK_LEN + ciphertext.len());
        out.extend_from_slice(iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

impl core::fmt::Debug for Aes128Cbc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Aes128Cbc").field("key", &"<secret>").finish()
    }
}

impl Cipher for Aes128Cbc {
    fn algorithm(&self) -> ConfidentialityAlgorithm {
        ConfidentialityAlgorithm::AesCbc128
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; AES_BLOCK_LEN];
        rand::rng().fill_bytes(&mut iv);
        self.encrypt_with_iv(plaintext, &iv)
    }

    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < AES_BLOCK_LEN {
            return Err(Error::Crypto("encrypted payload too short"));
        }

        let (iv, ciphertext) = payload.split_at(AES_BLOCK_LEN);
        let iv: [u8; AES_BLOCK_LEN] = iv
            .try_into()
            .map_err(|_| Error::Crypto("invalid IV"))?;
        if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(AES_BLOCK_LEN) {
            return Err(Error::Crypto("invalid AES-CBC ciphertext length"));
        }

        let mut plaintext = aes128_cbc_decrypt(&self.key, &iv, ciphertext)?;

        let pad_len = *plaintext
            .last()
            .ok_or(Error::Crypto("missing confidentiality pad length"))?
            as usize;
        if pad_len > plaintext.len() - 1 {
            return Err(Error::Crypto("invalid confidentiality pad length"));
        }

        let trailer_start = plaintext.len() - 1 - pad_len;
        let pad_bytes = &plaintext[trailer_start..plaintext.len() - 1];
        if pad_bytes
            .iter()
            .enumerate()
            .any(|(i, &b)| b != (i as u8).wrapping_add(1))
        {
            return Err(Error::Crypto("invalid confidentiality pad bytes"));
        }

        plaintext.truncate(trailer_start);
        Ok(plaintext)
    }
}
