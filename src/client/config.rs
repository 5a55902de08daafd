use std::time::Duration;

use crate::algorithm::CipherSuite;
use crate::crypto::SecretBytes;
use crate::error::{Error, Result};
use crate::session::{Credentials, HandshakeConfig};
use crate::types::PrivilegeLevel;

/// Settings collected by the client builders.
#[derive(Debug, Clone)]
pub(crate) struct SessionOptions {
    pub(crate) username: Option<Vec<u8>>,
    password: Option<SecretBytes>,
    bmc_key: Option<SecretBytes>,
    pub(crate) privilege: PrivilegeLevel,
    pub(crate) timeout: Duration,
    pub(crate) attempts: u32,
    pub(crate) cipher_suites: Vec<CipherSuite>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            bmc_key: None,
            privilege: PrivilegeLevel::Administrator,
            timeout: Duration::from_secs(1),
            attempts: 3,
            cipher_suites: vec![CipherSuite::SUITE_17, CipherSuite::SUITE_3],
        }
    }
}

impl SessionOptions {
    pub(crate) fn set_password(&mut self, password: Vec<u8>) {
        self.password = Some(SecretBytes::new(password));
    }

    pub(crate) fn set_bmc_key(&mut self, kg: Vec<u8>) {
        self.bmc_key = Some(SecretBytes::new(kg));
    }

    pub(crate) fn handshake_config(&self) -> Result<HandshakeConfig> {
        let username = self
            .username
            .clone()
            .ok_or(Error::InvalidArgument("username is required"))?;
        let password = self
            .password
            .clone()
            .ok_or(Error::InvalidArgument("password is required"))?;

        if username.len() > 16 {
            return Err(Error::InvalidArgument("username too long (max 16 bytes)"));
        }
        if self.cipher_suites.is_empty() {
            return Err(Error::InvalidArgument("at least one cipher suite is required"));
        }

        Ok(HandshakeConfig {
            credentials: Credentials {
                username,
                password,
                bmc_key: self.bmc_key.clone(),
            },
            privilege: self.privilege,
            cipher_suites: self.cipher_suites.clone(),
            timeout: self.timeout,
            attempts: self.attempts.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_prefer_sha256_suite() {
        let opts = SessionOptions::default();
        assert_eq!(
            opts.cipher_suites,
            [CipherSuite::SUITE_17, CipherSuite::SUITE_3]
        );
        assert_eq!(opts.privilege, PrivilegeLevel::Administrator);
    }

    #[test]
    fn credentials_are_required() {
        let mut opts = SessionOptions::default();
        assert!(matches!(
            opts.handshake_config(),
            Err(Error::InvalidArgument("username is required"))
        ));

        opts.username = Some(b"admin".to_vec());
        assert!(matches!(
            opts.handshake_config(),
            Err(Error::InvalidArgument("password is required"))
        ));

        opts.set_password(b"secret".to_vec());
        let config = opts.handshake_config().expect("config");
        assert_eq!(config.credentials.username, b"admin");
        assert!(config.credentials.bmc_key.is_none());
    }

    #[test]
    fn long_usernames_are_rejected() {
        let mut opts = SessionOptions::default();
        opts.username = Some(vec![b'a'; 17]);
        opts.set_password(b"x".to_vec());
        assert!(matches!(
            opts.handshake_config(),
            Err(Error::InvalidArgument(_))
        ));
    }
}
