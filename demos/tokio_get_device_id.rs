//! Open an RMCP+ session from tokio and issue two requests concurrently.
//!
//!   cargo run --features async --example tokio_get_device_id -- 10.0.0.5 admin secret

use std::time::Duration;

use bmc::{AsyncClient, PrivilegeLevel};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(target), Some(username), Some(password)) = (args.next(), args.next(), args.next())
    else {
        return Err("usage: tokio_get_device_id <host[:port]> <username> <password>".into());
    };

    let client = AsyncClient::builder_for(&target)?
        .username(username)
        .password(password)
        .privilege_level(PrivilegeLevel::User)
        .timeout(Duration::from_secs(2))
        .build()
        .await?;

    let (id, status) = tokio::try_join!(client.get_device_id(), client.get_chassis_status())?;
    println!(
        "device {:#04x} rev {} firmware {}.{:02x} IPMI {}",
        id.device_id, id.device_revision, id.firmware_major, id.firmware_minor, id.ipmi_version
    );
    println!(
        "manufacturer {} product {:#06x}",
        id.manufacturer_id, id.product_id
    );
    println!(
        "chassis power {}",
        if status.power.on { "on" } else { "off" }
    );

    client.close_session().await?;
    Ok(())
}
