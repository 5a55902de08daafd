//! Parsed command responses and the small enums commands take.

use core::fmt;

use crate::error::{Error, Result};
use crate::message::CompletionCode;
use crate::operation::{Enterprise, LayerType};

/// The privilege level requested for the IPMI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PrivilegeLevel {
    /// Callback privilege.
    Callback = 0x01,
    /// User privilege.
    User = 0x02,
    /// Operator privilege.
    Operator = 0x03,
    /// Administrator privilege.
    Administrator = 0x04,
    /// OEM-defined privilege.
    Oem = 0x05,
}

impl PrivilegeLevel {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    /// Privileges to try, in order, when the BMC rejects the requested role.
    pub(crate) fn fallback_candidates(self) -> &'static [PrivilegeLevel] {
        const DESCENDING: [PrivilegeLevel; 3] = [
            PrivilegeLevel::Administrator,
            PrivilegeLevel::Operator,
            PrivilegeLevel::User,
        ];

        match self {
            Self::Administrator => &DESCENDING,
            Self::Operator => &DESCENDING[1..],
            Self::User => &DESCENDING[2..],
            Self::Callback => &[PrivilegeLevel::Callback],
            Self::Oem => &[PrivilegeLevel::Oem],
        }
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Callback => "callback",
            Self::User => "user",
            Self::Operator => "operator",
            Self::Administrator => "administrator",
            Self::Oem => "oem",
        })
    }
}

/// A response as it came off the wire, before any command-specific parsing.
#[derive(Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// IPMI completion code.
    pub completion_code: CompletionCode,
    /// What the payload decodes as next.
    ///
    /// Always [`LayerType::Payload`] for a non-normal completion code.
    pub layer: LayerType,
    /// Payload bytes after the completion code.
    pub data: Vec<u8>,
}

impl RawResponse {
    /// Whether the command completed normally.
    pub fn is_ok(&self) -> bool {
        self.completion_code.is_normal()
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("completion_code", &self.completion_code)
            .field("layer", &self.layer)
            .field("data_len", &self.data.len())
            .finish()
    }
}

fn bit(byte: u8, n: u8) -> bool {
    byte & (1 << n) != 0
}

fn le24(bytes: &[u8]) -> u32 {
    u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16)
}

/// IPMI specification version, stored as two BCD digits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IpmiVersion {
    /// Major version (the low nibble on the wire).
    pub major: u8,
    /// Minor version (the high nibble on the wire).
    pub minor: u8,
}

impl IpmiVersion {
    fn from_bcd(byte: u8) -> Self {
        Self {
            major: byte & 0x0F,
            minor: byte >> 4,
        }
    }
}

impl fmt::Display for IpmiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// `Get Device ID` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    /// Device ID (BMC-defined).
    pub device_id: u8,
    /// Device revision (low nibble of byte 2).
    pub device_revision: u8,
    /// The device serves its own SDR repository.
    pub provides_sdrs: bool,
    /// Major firmware revision (7 bits).
    pub firmware_major: u8,
    /// Minor firmware revision, BCD encoded.
    pub firmware_minor: u8,
    /// Firmware, SDR or self-initialization in progress.
    pub update_in_progress: bool,
    /// IPMI version the device implements.
    pub ipmi_version: IpmiVersion,
    /// Additional device support bitmask (sensor device, SEL, FRU, ...).
    pub additional_device_support: u8,
    /// IANA manufacturer ID (20 bits used).
    pub manufacturer_id: u32,
    /// Product ID.
    pub product_id: u16,
    /// Auxiliary firmware revision, when the BMC sends one.
    pub aux_firmware_revision: Option<[u8; 4]>,
}

impl DeviceId {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 11 {
            return Err(Error::Truncated("Get Device ID response too short"));
        }

        Ok(Self {
            device_id: data[0],
            device_revision: data[1] & 0x0F,
            provides_sdrs: bit(data[1], 7),
            firmware_major: data[2] & 0x7F,
            update_in_progress: bit(data[2], 7),
            firmware_minor: data[3],
            ipmi_version: IpmiVersion::from_bcd(data[4]),
            additional_device_support: data[5],
            manufacturer_id: le24(&data[6..9]) & 0x000F_FFFF,
            product_id: u16::from_le_bytes([data[9], data[10]]),
            aux_firmware_revision: data
                .get(11..15)
                .and_then(|aux| <[u8; 4]>::try_from(aux).ok()),
        })
    }
}

/// Raw system GUID bytes as returned by `Get System GUID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemGuid {
    /// GUID bytes in wire order.
    pub bytes: [u8; 16],
}

impl SystemGuid {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let bytes = data
            .get(..16)
            .and_then(|b| <[u8; 16]>::try_from(b).ok())
            .ok_or(Error::Truncated("Get System GUID response too short"))?;
        Ok(Self { bytes })
    }
}

/// What the chassis does when AC power returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerRestorePolicy {
    /// Stay off.
    AlwaysOff,
    /// Return to the state before the loss.
    Previous,
    /// Power on.
    AlwaysOn,
    /// The BMC does not know.
    Unknown,
}

impl PowerRestorePolicy {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::AlwaysOff,
            1 => Self::Previous,
            2 => Self::AlwaysOn,
            _ => Self::Unknown,
        }
    }
}

/// Current power state (byte 1 of `Get Chassis Status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerState {
    /// System power is on.
    pub on: bool,
    /// Power overload.
    pub overload: bool,
    /// Interlock active.
    pub interlock: bool,
    /// Main power subsystem fault.
    pub main_power_fault: bool,
    /// Power control fault.
    pub control_fault: bool,
    /// Power restore policy.
    pub restore_policy: PowerRestorePolicy,
}

/// Cause of the last power change (byte 2 of `Get Chassis Status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastPowerEvent {
    /// AC failed.
    pub ac_failed: bool,
    /// Powered down because of an overload.
    pub overload: bool,
    /// Powered down because of an interlock.
    pub interlock: bool,
    /// Powered down because of a fault.
    pub fault: bool,
    /// Powered on through an IPMI command.
    pub commanded_on: bool,
}

/// Chassis identify indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyState {
    /// Off.
    Off,
    /// On for a timed interval.
    Timed,
    /// On until turned off.
    Indefinite,
}

/// Miscellaneous chassis state (byte 3 of `Get Chassis Status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChassisFlags {
    /// Chassis intrusion is active.
    pub intrusion: bool,
    /// Front panel lockout is active.
    pub front_panel_lockout: bool,
    /// A drive has faulted.
    pub drive_fault: bool,
    /// A cooling or fan fault was detected.
    pub cooling_fault: bool,
    /// Identify state, if the chassis reports it.
    pub identify: Option<IdentifyState>,
}

/// One front panel button (byte 4 of `Get Chassis Status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelButton {
    /// The button can be disabled through `Set Front Panel Enables`.
    pub disable_allowed: bool,
    /// The button is currently disabled.
    pub disabled: bool,
}

/// Front panel buttons, reported by BMCs that support disabling them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontPanelButtons {
    /// Power off button.
    pub power: PanelButton,
    /// Reset button.
    pub reset: PanelButton,
    /// Diagnostic interrupt button.
    pub diagnostic: PanelButton,
    /// Standby (sleep) button.
    pub standby: PanelButton,
}

impl FrontPanelButtons {
    fn from_byte(b: u8) -> Self {
        let button = |n| PanelButton {
            disable_allowed: bit(b, n + 4),
            disabled: bit(b, n),
        };
        Self {
            power: button(0),
            reset: button(1),
            diagnostic: button(2),
            standby: button(3),
        }
    }
}

/// `Get Chassis Status` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChassisStatus {
    /// Current power state.
    pub power: PowerState,
    /// Last power event.
    pub last_power_event: LastPowerEvent,
    /// Miscellaneous chassis state.
    pub flags: ChassisFlags,
    /// Front panel buttons; `None` when the optional byte is absent.
    pub front_panel: Option<FrontPanelButtons>,
}

impl ChassisStatus {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let [power, event, misc, rest @ ..] = data else {
            return Err(Error::Truncated("Get Chassis Status response too short"));
        };
        let (power, event, misc) = (*power, *event, *misc);

        let identify = bit(misc, 6).then(|| match (misc >> 4) & 0x03 {
            0 => IdentifyState::Off,
            1 => IdentifyState::Timed,
            _ => IdentifyState::Indefinite,
        });

        Ok(Self {
            power: PowerState {
                on: bit(power, 0),
                overload: bit(power, 1),
                interlock: bit(power, 2),
                main_power_fault: bit(power, 3),
                control_fault: bit(power, 4),
                restore_policy: PowerRestorePolicy::from_bits(power >> 5),
            },
            last_power_event: LastPowerEvent {
                ac_failed: bit(event, 0),
                overload: bit(event, 1),
                interlock: bit(event, 2),
                fault: bit(event, 3),
                commanded_on: bit(event, 4),
            },
            flags: ChassisFlags {
                intrusion: bit(misc, 0),
                front_panel_lockout: bit(misc, 1),
                drive_fault: bit(misc, 2),
                cooling_fault: bit(misc, 3),
                identify,
            },
            front_panel: rest.first().copied().map(FrontPanelButtons::from_byte),
        })
    }
}

/// `Chassis Control` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChassisControl {
    /// Power down (no orderly OS shutdown).
    PowerDown = 0x00,
    /// Power up.
    PowerUp = 0x01,
    /// Power down, wait, power up.
    PowerCycle = 0x02,
    /// Pulse the reset line.
    HardReset = 0x03,
    /// Pulse a diagnostic interrupt (NMI).
    PulseDiagnostic = 0x04,
    /// Emulate a fatal overtemperature to trigger an ACPI soft shutdown.
    AcpiSoft = 0x05,
}

impl From<ChassisControl> for u8 {
    fn from(control: ChassisControl) -> Self {
        control as u8
    }
}

/// IPMI v1.5 authentication types enabled on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthTypes(pub u8);

impl AuthTypes {
    /// No authentication.
    pub fn none(self) -> bool {
        bit(self.0, 0)
    }

    /// MD2.
    pub fn md2(self) -> bool {
        bit(self.0, 1)
    }

    /// MD5.
    pub fn md5(self) -> bool {
        bit(self.0, 2)
    }

    /// Straight password / key.
    pub fn password(self) -> bool {
        bit(self.0, 4)
    }

    /// OEM proprietary.
    pub fn oem(self) -> bool {
        bit(self.0, 5)
    }
}

/// Which kinds of login the channel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginModes {
    /// Users with non-null names exist.
    pub non_null_usernames: bool,
    /// Users with a null name but a non-null password exist.
    pub null_usernames: bool,
    /// Null user with null password (anonymous) is enabled.
    pub anonymous: bool,
}

/// OEM authentication details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OemAuth {
    /// Enterprise number of the OEM.
    pub enterprise: Enterprise,
    /// OEM auxiliary data.
    pub aux_data: u8,
}

/// `Get Channel Authentication Capabilities` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAuthCapabilities {
    /// Channel the answer applies to.
    pub channel: u8,
    /// The response carries IPMI v2.0 extended capabilities.
    pub extended: bool,
    /// IPMI v1.5 authentication types.
    pub auth_types: AuthTypes,
    /// A non-zero `Kg` is configured, so two-key login is required.
    pub kg_configured: bool,
    /// Per-message authentication is enabled.
    pub per_message_auth: bool,
    /// User-level command authentication is enabled.
    pub user_level_auth: bool,
    /// Login modes.
    pub logins: LoginModes,
    /// Channel supports IPMI v1.5 sessions.
    pub ipmi_v15: bool,
    /// Channel supports IPMI v2.0 (RMCP+) sessions.
    pub ipmi_v20: bool,
    /// Present when the OEM authentication type is enabled.
    pub oem: Option<OemAuth>,
}

impl ChannelAuthCapabilities {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Truncated(
                "Get Channel Authentication Capabilities response too short",
            ));
        }

        let auth_types = AuthTypes(data[1] & 0x3F);
        let oem = auth_types.oem().then(|| OemAuth {
            enterprise: Enterprise::from_le_bytes([data[4], data[5], data[6]]),
            aux_data: data[7],
        });
        let extended = bit(data[1], 7);

        Ok(Self {
            channel: data[0] & 0x0F,
            extended,
            auth_types,
            kg_configured: bit(data[2], 5),
            per_message_auth: !bit(data[2], 4),
            user_level_auth: !bit(data[2], 3),
            logins: LoginModes {
                non_null_usernames: bit(data[2], 2),
                null_usernames: bit(data[2], 1),
                anonymous: bit(data[2], 0),
            },
            // Without extended data the channel is v1.5 only.
            ipmi_v15: !extended || bit(data[3], 0),
            ipmi_v20: extended && bit(data[3], 1),
            oem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_fields() {
        let full = [
            0x20, 0x81, 0x82, 0x10, 0x51, 0xBF, 0x57, 0x01, 0xF0, 0x34, 0x12, 1, 2, 3, 4,
        ];
        let id = DeviceId::parse(&full).expect("parse");
        assert_eq!(id.device_revision, 0x01);
        assert!(id.provides_sdrs);
        assert_eq!(id.firmware_major, 0x02);
        assert!(id.update_in_progress);
        assert_eq!(id.ipmi_version, IpmiVersion { major: 1, minor: 5 });
        assert_eq!(id.ipmi_version.to_string(), "1.5");
        assert_eq!(id.manufacturer_id, 0x00_0157);
        assert_eq!(id.product_id, 0x1234);
        assert_eq!(id.aux_firmware_revision, Some([1, 2, 3, 4]));

        let short = DeviceId::parse(&full[..11]).expect("parse");
        assert_eq!(short.aux_firmware_revision, None);
        assert!(matches!(
            DeviceId::parse(&full[..10]),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn chassis_status_fields() {
        let status = ChassisStatus::parse(&[0x5F, 0x19, 0x6F, 0x31]).expect("parse");

        assert!(status.power.on && status.power.overload && status.power.interlock);
        assert!(status.power.main_power_fault && status.power.control_fault);
        assert_eq!(status.power.restore_policy, PowerRestorePolicy::AlwaysOn);

        let event = status.last_power_event;
        assert!(event.ac_failed && event.fault && event.commanded_on);
        assert!(!event.overload && !event.interlock);

        assert!(status.flags.intrusion && status.flags.cooling_fault);
        assert_eq!(status.flags.identify, Some(IdentifyState::Indefinite));

        let panel = status.front_panel.expect("front panel byte");
        assert!(panel.power.disable_allowed && panel.power.disabled);
        assert!(panel.reset.disable_allowed && !panel.reset.disabled);
        assert!(!panel.standby.disable_allowed);
    }

    #[test]
    fn chassis_status_optional_parts() {
        let status = ChassisStatus::parse(&[0x60, 0x00, 0x00]).expect("parse");
        assert_eq!(status.power.restore_policy, PowerRestorePolicy::Unknown);
        assert_eq!(status.flags.identify, None);
        assert_eq!(status.front_panel, None);

        // A zero byte is still a report: nothing can be disabled.
        let status = ChassisStatus::parse(&[0, 0, 0, 0]).expect("parse");
        assert!(status.front_panel.is_some());

        assert!(matches!(
            ChassisStatus::parse(&[0, 0]),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn channel_auth_capabilities_with_oem() {
        let data = [0x82, 0xA1, 0x3D, 0x03, 0x33, 0x22, 0x11, 0x77];
        let caps = ChannelAuthCapabilities::parse(&data).expect("parse");

        assert_eq!(caps.channel, 0x02);
        assert!(caps.extended);
        assert!(caps.auth_types.none() && caps.auth_types.oem());
        assert!(!caps.auth_types.md5());
        assert!(caps.kg_configured);
        assert!(!caps.per_message_auth && !caps.user_level_auth);
        assert!(caps.logins.non_null_usernames && caps.logins.anonymous);
        assert!(!caps.logins.null_usernames);
        assert!(caps.ipmi_v15 && caps.ipmi_v20);

        let oem = caps.oem.expect("oem");
        assert_eq!(oem.enterprise.number(), 0x11_2233);
        assert_eq!(oem.aux_data, 0x77);
    }

    #[test]
    fn channel_auth_capabilities_without_extended_data() {
        let data = [0x01, 0x14, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD];
        let caps = ChannelAuthCapabilities::parse(&data).expect("parse");

        assert!(!caps.extended);
        assert!(caps.auth_types.md5() && caps.auth_types.password());
        assert!(caps.per_message_auth && caps.user_level_auth);
        assert!(caps.ipmi_v15 && !caps.ipmi_v20);
        assert_eq!(caps.oem, None);
    }

    #[test]
    fn privilege_fallback_never_climbs() {
        assert_eq!(
            PrivilegeLevel::Operator.fallback_candidates(),
            [PrivilegeLevel::Operator, PrivilegeLevel::User]
        );
        assert_eq!(
            PrivilegeLevel::Callback.fallback_candidates(),
            [PrivilegeLevel::Callback]
        );
    }
}
