//! Typed IPMI commands layered over the raw request/response API.
//!
//! Each [`Command`] names its request [`Operation`], encodes its request
//! data and parses the response data that follows the completion code.

use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::types::{
    ChannelAuthCapabilities, ChassisControl, ChassisStatus, DeviceId, PrivilegeLevel,
    RawResponse, SystemGuid,
};

/// A typed IPMI command (single request/response).
pub trait Command {
    /// Parsed output type.
    type Output;

    /// Request operation (network function and command number).
    const OPERATION: Operation;

    /// Encode request payload bytes (excluding NetFn/Cmd framing).
    fn request_data(&self) -> Vec<u8>;

    /// Parse a raw response into the typed output.
    fn parse_response(&self, response: RawResponse) -> Result<Self::Output>;
}

fn ok_data(response: &RawResponse) -> Result<&[u8]> {
    if !response.completion_code.is_normal() {
        return Err(Error::CompletionCode {
            completion_code: response.completion_code,
        });
    }
    Ok(&response.data)
}

/// `Get Device ID` (App NetFn, cmd 0x01).
#[derive(Debug, Clone, Copy)]
pub struct GetDeviceId;

impl Command for GetDeviceId {
    type Output = DeviceId;
    const OPERATION: Operation = Operation::GET_DEVICE_ID_REQ;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        DeviceId::parse(ok_data(&response)?)
    }
}

/// `Get System GUID` (App NetFn, cmd 0x37).
#[derive(Debug, Clone, Copy)]
pub struct GetSystemGuid;

impl Command for GetSystemGuid {
    type Output = SystemGuid;
    const OPERATION: Operation = Operation::GET_SYSTEM_GUID_REQ;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        SystemGuid::parse(ok_data(&response)?)
    }
}

/// `Get Chassis Status` (Chassis NetFn, cmd 0x01).
#[derive(Debug, Clone, Copy)]
pub struct GetChassisStatus;

impl Command for GetChassisStatus {
    type Output = ChassisStatus;
    const OPERATION: Operation = Operation::GET_CHASSIS_STATUS_REQ;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        ChassisStatus::parse(ok_data(&response)?)
    }
}

/// `Chassis Control` (Chassis NetFn, cmd 0x02).
#[derive(Debug, Clone, Copy)]
pub struct ChassisControlCommand {
    /// Control operation.
    pub control: ChassisControl,
}

impl Command for ChassisControlCommand {
    type Output = ();
    const OPERATION: Operation = Operation::CHASSIS_CONTROL_REQ;

    fn request_data(&self) -> Vec<u8> {
        vec![self.control.into()]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        ok_data(&response).map(drop)
    }
}

/// `Get Channel Authentication Capabilities` (App NetFn, cmd 0x38).
#[derive(Debug, Clone, Copy)]
pub struct GetChannelAuthCapabilities {
    /// Channel number (low nibble).
    pub channel: u8,
    /// Privilege to query.
    pub privilege: PrivilegeLevel,
    /// Request that IPMI v2.0 data be included when available.
    pub request_v2_data: bool,
}

impl GetChannelAuthCapabilities {
    /// Create a query that requests IPMI v2.0 data (when supported).
    pub fn new(channel: u8, privilege: PrivilegeLevel) -> Self {
        Self {
            channel,
            privilege,
            request_v2_data: true,
        }
    }

    /// Return a variant that does not request IPMI v2.0 data.
    pub fn without_v2_data(self) -> Self {
        Self {
            request_v2_data: false,
            ..self
        }
    }
}

impl Command for GetChannelAuthCapabilities {
    type Output = ChannelAuthCapabilities;
    const OPERATION: Operation = Operation::GET_CHANNEL_AUTH_CAPABILITIES_REQ;

    fn request_data(&self) -> Vec<u8> {
        let channel = if self.request_v2_data {
            self.channel | 0x80
        } else {
            self.channel & 0x7F
        };
        vec![channel, self.privilege.as_u8() & 0x0F]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        ChannelAuthCapabilities::parse(ok_data(&response)?)
    }
}

/// `Close Session` (App NetFn, cmd 0x3C).
#[derive(Debug, Clone, Copy)]
pub struct CloseSession {
    /// Managed system session ID to close.
    pub session_id: u32,
}

impl Command for CloseSession {
    type Output = ();
    const OPERATION: Operation = Operation::CLOSE_SESSION_REQ;

    fn request_data(&self) -> Vec<u8> {
        self.session_id.to_le_bytes().to_vec()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        ok_data(&response).map(drop)
    }
}
