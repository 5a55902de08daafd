use core::fmt;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::algorithm::{AuthenticationAlgorithm, IntegrityAlgorithm};
use crate::confidentiality::AdditionalKeyMaterialGenerator;
use crate::error::{Error, Result};

/// Length of a user key (K_UID) or BMC key (K_G) on the wire.
pub(crate) const KEY_LEN: usize = 20;

/// A minimal secret container that zeroizes its contents on drop.
///
/// Never exposes secrets via `Debug`.
#[derive(Clone)]
pub(crate) struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn to_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(normalize_key(self.expose()))
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Normalize a secret (password/Kg) into the fixed 20-byte key used by RAKP.
///
/// Longer secrets are truncated, shorter ones zero-padded.
pub(crate) fn normalize_key(secret: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    let n = secret.len().min(out.len());
    out[..n].copy_from_slice(&secret[..n]);
    out
}

pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<[u8; 20]> {
    let mut mac =
        <HmacSha1 as Mac>::new_from_slice(key).map_err(|_| Error::Crypto("invalid HMAC key"))?;
    mac.update(data);
    let bytes = mac.finalize().into_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes[..]);
    Ok(out)
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto("invalid HMAC key"))?;
    mac.update(data);
    let bytes = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[..]);
    Ok(out)
}

/// The keyed hash of a RAKP authentication algorithm. Empty for RAKP-none.
pub(crate) fn auth_hmac(
    algorithm: AuthenticationAlgorithm,
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>> {
    match algorithm {
        AuthenticationAlgorithm::None => Ok(Vec::new()),
        AuthenticationAlgorithm::HmacSha1 => Ok(hmac_sha1(key, data)?.to_vec()),
        AuthenticationAlgorithm::HmacSha256 => Ok(hmac_sha256(key, data)?.to_vec()),
    }
}

/// The truncated keyed hash of an integrity algorithm. Empty for none.
pub(crate) fn integrity_hmac(
    algorithm: IntegrityAlgorithm,
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut full = match algorithm {
        IntegrityAlgorithm::None => return Ok(Vec::new()),
        IntegrityAlgorithm::HmacSha1_96 => hmac_sha1(key, data)?.to_vec(),
        IntegrityAlgorithm::HmacSha256_128 => hmac_sha256(key, data)?.to_vec(),
    };
    full.truncate(algorithm.auth_code_len());
    Ok(full)
}

/// Session integrity key and the `K(n)` generator built on it.
///
/// `K(n) = HMAC_auth(SIK, [n; 20])`; K1 keys integrity, K2 confidentiality.
pub(crate) struct SessionKeys {
    algorithm: AuthenticationAlgorithm,
    sik: Zeroizing<Vec<u8>>,
}

impl SessionKeys {
    pub(crate) fn new(algorithm: AuthenticationAlgorithm, sik: Vec<u8>) -> Self {
        Self {
            algorithm,
            sik: Zeroizing::new(sik),
        }
    }

    pub(crate) fn sik(&self) -> &[u8] {
        &self.sik
    }
}

impl AdditionalKeyMaterialGenerator for SessionKeys {
    fn k(&self, n: u8) -> Result<Zeroizing<Vec<u8>>> {
        let constant = [n; KEY_LEN];
        Ok(Zeroizing::new(auth_hmac(self.algorithm, &self.sik, &constant)?))
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("algorithm", &self.algorithm)
            .field("sik", &"<secret>")
            .finish()
    }
}

/// AES-128-CBC encryption without padding.
///
/// The caller must ensure `plaintext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_encrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if !plaintext.len().is_multiple_of(16) {
        return Err(Error::Crypto(
            "AES-CBC plaintext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(plaintext.len());
    let mut prev = *iv;

    for block in plaintext.chunks(16) {
        let mut ga = GenericArray::clone_from_slice(block);
        for (b, p) in ga.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(&mut ga);
        prev.copy_from_slice(&ga);
        out.extend_from_slice(&prev);
    }

    Ok(out)
}

/// AES-128-CBC decryption without padding.
///
/// The caller must ensure `ciphertext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_decrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if !ciphertext.len().is_multiple_of(16) {
        return Err(Error::Crypto(
            "AES-CBC ciphertext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev: &[u8] = iv;

    for block in ciphertext.chunks(16) {
        let mut ga = GenericArray::clone_from_slice(block);
        cipher.decrypt_block(&mut ga);
        for (b, p) in ga.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        out.extend_from_slice(&ga);
        prev = block;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

    #[test]
    fn hmac_vectors() {
        let mac = hmac_sha1(b"key", FOX).expect("hmac");
        assert_eq!(
            mac,
            [
                0xDE, 0x7C, 0x9B, 0x85, 0xB8, 0xB7, 0x8A, 0xA6, 0xBC, 0x8A, 0x7A, 0x36, 0xF7, 0x0A,
                0x90, 0x70, 0x1C, 0x9D, 0xB4, 0xD9,
            ]
        );

        let mac = hmac_sha256(b"key", FOX).expect("hmac");
        assert_eq!(
            mac,
            [
                0xF7, 0xBC, 0x83, 0xF4, 0x30, 0x53, 0x84, 0x24, 0xB1, 0x32, 0x98, 0xE6, 0xAA, 0x6F,
                0xB1, 0x43, 0xEF, 0x4D, 0x59, 0xA1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9D, 0xBC,
                0x2D, 0x1A, 0x3C, 0xD8,
            ]
        );
    }

    #[test]
    fn integrity_codes_are_truncated() {
        let sha1 = integrity_hmac(IntegrityAlgorithm::HmacSha1_96, b"key", FOX).expect("hmac");
        assert_eq!(
            sha1,
            [0xDE, 0x7C, 0x9B, 0x85, 0xB8, 0xB7, 0x8A, 0xA6, 0xBC, 0x8A, 0x7A, 0x36]
        );

        let sha256 =
            integrity_hmac(IntegrityAlgorithm::HmacSha256_128, b"key", FOX).expect("hmac");
        assert_eq!(sha256.len(), 16);
        assert_eq!(sha256[..4], [0xF7, 0xBC, 0x83, 0xF4]);

        assert!(
            integrity_hmac(IntegrityAlgorithm::None, b"key", FOX)
                .expect("none")
                .is_empty()
        );
    }

    #[test]
    fn key_derivation_vectors() {
        let sik: Vec<u8> = (0u8..20).collect();
        let keys = SessionKeys::new(AuthenticationAlgorithm::HmacSha1, sik);

        let k1 = keys.k(1).expect("k1");
        assert_eq!(
            k1.as_slice(),
            [
                0x34, 0xE5, 0x1C, 0x57, 0x1C, 0x5C, 0x39, 0x24, 0x60, 0xE6, 0x77, 0x5D, 0xD5, 0xEC,
                0xFA, 0x79, 0xF4, 0xA7, 0xF5, 0x05,
            ]
        );

        let k2 = keys.k(2).expect("k2");
        assert_eq!(
            k2.as_slice(),
            [
                0xC1, 0x30, 0x76, 0xED, 0x19, 0x57, 0xA5, 0x9E, 0x8C, 0x7A, 0xBB, 0x24, 0x60, 0xD2,
                0x2C, 0x1A, 0x15, 0x9D, 0xE6, 0x0A,
            ]
        );
    }

    #[test]
    fn aes128_cbc_vectors() {
        let key: [u8; 16] = core::array::from_fn(|i| i as u8);
        let iv: [u8; 16] = core::array::from_fn(|i| 0x10 + i as u8);
        let plaintext = b"0123456789abcdef";

        let ciphertext = aes128_cbc_encrypt(&key, &iv, plaintext).expect("encrypt");
        assert_eq!(
            ciphertext,
            [
                0xEB, 0x9E, 0x5B, 0xA4, 0x1B, 0x90, 0x2D, 0xB8, 0x25, 0x29, 0x82, 0xAA, 0x1A, 0x23,
                0xF4, 0xBE,
            ]
        );

        let decrypted = aes128_cbc_decrypt(&key, &iv, &ciphertext).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn aes128_cbc_rejects_non_block_multiple() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        let err = aes128_cbc_encrypt(&key, &iv, b"not16").unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn secrets_do_not_leak_through_debug() {
        let secret = SecretBytes::new(b"hunter2".to_vec());
        assert_eq!(format!("{secret:?}"), "<secret>");
        assert_eq!(secret.to_key()[..7], *b"hunter2");
        assert_eq!(secret.to_key()[7..], [0u8; 13]);
    }
}
