//! Ask a BMC which login methods a channel offers, before any session exists.
//!
//!   cargo run --example get_channel_auth_capabilities -- 10.0.0.5 14 operator

use std::time::Duration;

use bmc::{Client, PrivilegeLevel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [target, rest @ ..] = args.as_slice() else {
        return Err("usage: get_channel_auth_capabilities <host[:port]> [channel] [privilege]".into());
    };
    let channel = match rest.first() {
        Some(channel) => channel_number(channel)?,
        None => 0x0E,
    };
    let privilege = match rest.get(1).map(String::as_str) {
        None | Some("admin") | Some("administrator") => PrivilegeLevel::Administrator,
        Some("operator") => PrivilegeLevel::Operator,
        Some("user") => PrivilegeLevel::User,
        Some("callback") => PrivilegeLevel::Callback,
        Some(other) => return Err(format!("unknown privilege {other:?}").into()),
    };

    let client = Client::builder_for(target)?
        .timeout(Duration::from_secs(2))
        .build_sessionless()?;
    let caps = client.get_channel_auth_capabilities(channel, privilege)?;

    println!("channel {} ({privilege})", caps.channel);
    println!("  IPMI v1.5 sessions: {}", caps.ipmi_v15);
    println!("  IPMI v2.0 sessions: {}", caps.ipmi_v20);
    println!("  two-key login:      {}", caps.kg_configured);
    println!("  anonymous login:    {}", caps.logins.anonymous);
    if let Some(oem) = caps.oem {
        println!("  OEM enterprise:     {}", oem.enterprise.number());
    }
    Ok(())
}

fn channel_number(s: &str) -> Result<u8, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
}
