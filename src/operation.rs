//! Network functions and operations.
//!
//! An [`Operation`] is the composite key `{network function, body code or
//! enterprise number, command}` that identifies a command class and decides
//! which payload layer follows the message envelope.

use core::fmt;
use std::collections::HashMap;
use std::sync::LazyLock;

/// 6-bit network function code.
///
/// Even values are requests; the paired odd value is the matching response.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkFunction(u8);

impl NetworkFunction {
    /// Chassis request.
    pub const CHASSIS_REQ: Self = Self(0x00);
    /// Chassis response.
    pub const CHASSIS_RSP: Self = Self(0x01);
    /// Bridge request.
    pub const BRIDGE_REQ: Self = Self(0x02);
    /// Bridge response.
    pub const BRIDGE_RSP: Self = Self(0x03);
    /// Sensor/Event request.
    pub const SENSOR_EVENT_REQ: Self = Self(0x04);
    /// Sensor/Event response.
    pub const SENSOR_EVENT_RSP: Self = Self(0x05);
    /// Application request.
    pub const APP_REQ: Self = Self(0x06);
    /// Application response.
    pub const APP_RSP: Self = Self(0x07);
    /// Firmware request.
    pub const FIRMWARE_REQ: Self = Self(0x08);
    /// Firmware response.
    pub const FIRMWARE_RSP: Self = Self(0x09);
    /// Storage request.
    pub const STORAGE_REQ: Self = Self(0x0A);
    /// Storage response.
    pub const STORAGE_RSP: Self = Self(0x0B);
    /// Transport request.
    pub const TRANSPORT_REQ: Self = Self(0x0C);
    /// Transport response.
    pub const TRANSPORT_RSP: Self = Self(0x0D);
    /// Group extension request; carries a body code.
    pub const GROUP_REQ: Self = Self(0x2C);
    /// Group extension response; carries a body code.
    pub const GROUP_RSP: Self = Self(0x2D);
    /// OEM/Group request; carries an enterprise number.
    pub const OEM_REQ: Self = Self(0x2E);
    /// OEM/Group response; carries an enterprise number.
    pub const OEM_RSP: Self = Self(0x2F);

    /// Build a network function from its code. Bits above the low 6 are discarded.
    pub const fn new(code: u8) -> Self {
        Self(code & 0x3F)
    }

    /// Raw 6-bit code.
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Whether this function denotes a request (even code).
    pub const fn is_request(self) -> bool {
        self.0 & 0x01 == 0
    }

    /// The response function paired with this one.
    pub const fn response(self) -> Self {
        Self(self.0 | 0x01)
    }

    /// The request function paired with this one.
    pub const fn request(self) -> Self {
        Self(self.0 & !0x01)
    }

    /// Which extra header field this function requires.
    pub const fn extension_kind(self) -> ExtensionKind {
        match self.request().0 {
            0x2C => ExtensionKind::Body,
            0x2E => ExtensionKind::Enterprise,
            _ => ExtensionKind::None,
        }
    }
}

impl fmt::Debug for NetworkFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkFunction({:#04x})", self.0)
    }
}

impl fmt::Display for NetworkFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.request().0 {
            0x00 => "Chassis",
            0x02 => "Bridge",
            0x04 => "Sensor/Event",
            0x06 => "App",
            0x08 => "Firmware",
            0x0A => "Storage",
            0x0C => "Transport",
            0x2C => "Group",
            0x2E => "OEM",
            _ => return write!(f, "{:#04x}", self.0),
        };
        let dir = if self.is_request() { "Req" } else { "Rsp" };
        write!(f, "{name}{dir}")
    }
}

/// Defining body code of a Group extension message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyCode(pub u8);

/// IANA private enterprise number (24 bits on the wire, little-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Enterprise(u32);

impl Enterprise {
    /// Build an enterprise number. Returns `None` if it does not fit in 24 bits.
    pub const fn new(number: u32) -> Option<Self> {
        if number > 0x00FF_FFFF {
            None
        } else {
            Some(Self(number))
        }
    }

    /// Raw enterprise number.
    pub const fn number(self) -> u32 {
        self.0
    }

    pub(crate) fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16))
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 3] {
        let b = self.0.to_le_bytes();
        [b[0], b[1], b[2]]
    }
}

/// The extra header field class a network function requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    /// No extra field.
    None,
    /// One body code byte (Group).
    Body,
    /// Three enterprise number bytes (OEM).
    Enterprise,
}

impl ExtensionKind {
    /// Number of header bytes the extension occupies after the command
    /// (and completion code, for responses).
    ///
    /// Both the encoder and the decoder size the header through this.
    pub const fn wire_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Body => 1,
            Self::Enterprise => 3,
        }
    }
}

/// The value of the extra header field, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Extension {
    /// No extra field.
    #[default]
    None,
    /// Group body code.
    Body(BodyCode),
    /// OEM enterprise number.
    Enterprise(Enterprise),
}

impl Extension {
    /// The class of this extension value.
    pub const fn kind(self) -> ExtensionKind {
        match self {
            Self::None => ExtensionKind::None,
            Self::Body(_) => ExtensionKind::Body,
            Self::Enterprise(_) => ExtensionKind::Enterprise,
        }
    }
}

/// Uniquely identifies a command the BMC can perform, or its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    /// Network function code.
    pub function: NetworkFunction,
    /// Body code or enterprise number; must match `function`'s extension kind.
    pub extension: Extension,
    /// Command number within the function class.
    pub command: u8,
}

/// Identifies the payload layer that follows a message envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    /// Opaque bytes: unknown operation or non-normal completion code.
    Payload,
    /// `Get Device ID` response.
    GetDeviceIdRsp,
    /// `Get Chassis Status` response.
    GetChassisStatusRsp,
    /// `Get System GUID` response.
    GetSystemGuidRsp,
    /// `Get Channel Authentication Capabilities` response.
    GetChannelAuthCapabilitiesRsp,
    /// `Get SDR Repository Info` response.
    GetSdrRepositoryInfoRsp,
    /// `Get SDR` response.
    GetSdrRsp,
    /// `Get Sensor Reading` response.
    GetSensorReadingRsp,
    /// `Get Session Info` response.
    GetSessionInfoRsp,
}

impl Operation {
    /// An operation on a network function without extension bytes.
    pub const fn new(function: NetworkFunction, command: u8) -> Self {
        Self {
            function,
            extension: Extension::None,
            command,
        }
    }

    /// A Group extension operation.
    pub const fn group(request: bool, body: BodyCode, command: u8) -> Self {
        let function = if request {
            NetworkFunction::GROUP_REQ
        } else {
            NetworkFunction::GROUP_RSP
        };
        Self {
            function,
            extension: Extension::Body(body),
            command,
        }
    }

    /// An OEM operation.
    pub const fn oem(request: bool, enterprise: Enterprise, command: u8) -> Self {
        let function = if request {
            NetworkFunction::OEM_REQ
        } else {
            NetworkFunction::OEM_RSP
        };
        Self {
            function,
            extension: Extension::Enterprise(enterprise),
            command,
        }
    }

    /// The response operation matching this request.
    pub const fn response(self) -> Self {
        Self {
            function: self.function.response(),
            ..self
        }
    }

    /// Whether the extension value is consistent with the network function.
    pub fn is_well_formed(&self) -> bool {
        self.extension.kind() == self.function.extension_kind()
    }

    /// The payload layer that follows a message carrying this operation
    /// with a normal completion code.
    pub fn next_layer(&self) -> LayerType {
        OPERATION_LAYERS
            .get(self)
            .copied()
            .unwrap_or(LayerType::Payload)
    }

    /// `Get Chassis Status` request.
    pub const GET_CHASSIS_STATUS_REQ: Self = Self::new(NetworkFunction::CHASSIS_REQ, 0x01);
    /// `Get Chassis Status` response.
    pub const GET_CHASSIS_STATUS_RSP: Self = Self::new(NetworkFunction::CHASSIS_RSP, 0x01);
    /// `Chassis Control` request.
    pub const CHASSIS_CONTROL_REQ: Self = Self::new(NetworkFunction::CHASSIS_REQ, 0x02);
    /// `Chassis Control` response.
    pub const CHASSIS_CONTROL_RSP: Self = Self::new(NetworkFunction::CHASSIS_RSP, 0x02);
    /// `Get Device ID` request.
    pub const GET_DEVICE_ID_REQ: Self = Self::new(NetworkFunction::APP_REQ, 0x01);
    /// `Get Device ID` response.
    pub const GET_DEVICE_ID_RSP: Self = Self::new(NetworkFunction::APP_RSP, 0x01);
    /// `Get System GUID` request.
    pub const GET_SYSTEM_GUID_REQ: Self = Self::new(NetworkFunction::APP_REQ, 0x37);
    /// `Get System GUID` response.
    pub const GET_SYSTEM_GUID_RSP: Self = Self::new(NetworkFunction::APP_RSP, 0x37);
    /// `Get Channel Authentication Capabilities` request.
    pub const GET_CHANNEL_AUTH_CAPABILITIES_REQ: Self =
        Self::new(NetworkFunction::APP_REQ, 0x38);
    /// `Get Channel Authentication Capabilities` response.
    pub const GET_CHANNEL_AUTH_CAPABILITIES_RSP: Self =
        Self::new(NetworkFunction::APP_RSP, 0x38);
    /// `Close Session` request.
    pub const CLOSE_SESSION_REQ: Self = Self::new(NetworkFunction::APP_REQ, 0x3C);
    /// `Close Session` response.
    pub const CLOSE_SESSION_RSP: Self = Self::new(NetworkFunction::APP_RSP, 0x3C);
    /// `Get Session Info` request.
    pub const GET_SESSION_INFO_REQ: Self = Self::new(NetworkFunction::APP_REQ, 0x3D);
    /// `Get Session Info` response.
    pub const GET_SESSION_INFO_RSP: Self = Self::new(NetworkFunction::APP_RSP, 0x3D);
    /// `Get SDR Repository Info` request.
    pub const GET_SDR_REPOSITORY_INFO_REQ: Self = Self::new(NetworkFunction::STORAGE_REQ, 0x20);
    /// `Get SDR Repository Info` response.
    pub const GET_SDR_REPOSITORY_INFO_RSP: Self = Self::new(NetworkFunction::STORAGE_RSP, 0x20);
    /// `Get SDR` request.
    pub const GET_SDR_REQ: Self = Self::new(NetworkFunction::STORAGE_REQ, 0x23);
    /// `Get SDR` response.
    pub const GET_SDR_RSP: Self = Self::new(NetworkFunction::STORAGE_RSP, 0x23);
    /// `Get Sensor Reading` request.
    pub const GET_SENSOR_READING_REQ: Self = Self::new(NetworkFunction::SENSOR_EVENT_REQ, 0x2D);
    /// `Get Sensor Reading` response.
    pub const GET_SENSOR_READING_RSP: Self = Self::new(NetworkFunction::SENSOR_EVENT_RSP, 0x2D);
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cmd {:#04x}", self.function, self.command)?;
        match self.extension {
            Extension::None => Ok(()),
            Extension::Body(body) => write!(f, " body {:#04x}", body.0),
            Extension::Enterprise(en) => write!(f, " enterprise {}", en.number()),
        }
    }
}

// Read-only after first use; lookups need no synchronization.
static OPERATION_LAYERS: LazyLock<HashMap<Operation, LayerType>> = LazyLock::new(|| {
    HashMap::from([
        (Operation::GET_DEVICE_ID_RSP, LayerType::GetDeviceIdRsp),
        (
            Operation::GET_CHASSIS_STATUS_RSP,
            LayerType::GetChassisStatusRsp,
        ),
        (Operation::GET_SYSTEM_GUID_RSP, LayerType::GetSystemGuidRsp),
        (
            Operation::GET_CHANNEL_AUTH_CAPABILITIES_RSP,
            LayerType::GetChannelAuthCapabilitiesRsp,
        ),
        (
            Operation::GET_SDR_REPOSITORY_INFO_RSP,
            LayerType::GetSdrRepositoryInfoRsp,
        ),
        (Operation::GET_SDR_RSP, LayerType::GetSdrRsp),
        (
            Operation::GET_SENSOR_READING_RSP,
            LayerType::GetSensorReadingRsp,
        ),
        (Operation::GET_SESSION_INFO_RSP, LayerType::GetSessionInfoRsp),
    ])
});
