use std::fmt::Write as _;
use std::sync::OnceLock;

/// Set to any non-empty value to hex-dump every datagram and IPMI message.
pub(crate) const PACKET_DUMP_ENV: &str = "IPMI_DEBUG";

pub(crate) fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(PACKET_DUMP_ENV)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    })
}

pub(crate) fn dump_hex(label: &str, bytes: &[u8]) {
    if !enabled() {
        return;
    }
    let hex = to_hex(bytes);

    #[cfg(feature = "tracing")]
    tracing::trace!(label, len = bytes.len(), bytes = %hex, "packet dump");

    #[cfg(not(feature = "tracing"))]
    eprintln!("{label} ({}): {hex}", bytes.len());
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_space_separated() {
        assert_eq!(to_hex(&[0x06, 0x00, 0xFF]), "06 00 ff");
        assert_eq!(to_hex(&[]), "");
    }
}
