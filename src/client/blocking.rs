use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::algorithm::CipherSuite;
use crate::client::config::SessionOptions;
use crate::client::core::{ClientCore, log_undecodable};
use crate::commands::{
    ChassisControlCommand, CloseSession, Command, GetChannelAuthCapabilities, GetChassisStatus,
    GetDeviceId, GetSystemGuid,
};
use crate::error::{Error, Result};
use crate::message::CompletionCode;
use crate::operation::{NetworkFunction, Operation};
use crate::session::{Session, establish_session};
use crate::transport::{Transport, UdpTransport, resolve_target};
use crate::types::{
    ChannelAuthCapabilities, ChassisControl, ChassisStatus, DeviceId, PrivilegeLevel, RawResponse,
    SystemGuid,
};

/// A blocking IPMI v2.0 RMCP+ client.
///
/// `Client` is cheap to clone; clones share one session and one socket, and
/// may issue requests concurrently from different threads.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Box<dyn Transport + Send + Sync>,
    state: Mutex<Inner>,
    delivered: Condvar,
    timeout: Duration,
}

struct Inner {
    core: ClientCore,
    mailbox: HashMap<u8, RawResponse>,
    reader_active: bool,
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    target: SocketAddr,
    options: SessionOptions,
}

impl ClientBuilder {
    /// Create a new builder.
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            options: SessionOptions::default(),
        }
    }

    /// Set the username (bytes).
    ///
    /// IPMI usernames are ASCII in most deployments, but the protocol treats them as raw bytes.
    pub fn username_bytes(mut self, username: impl Into<Vec<u8>>) -> Self {
        self.options.username = Some(username.into());
        self
    }

    /// Set the username (UTF-8 string). This is a convenience wrapper around [`Self::username_bytes`].
    pub fn username(self, username: impl AsRef<str>) -> Self {
        self.username_bytes(username.as_ref().as_bytes())
    }

    /// Set the password (bytes).
    pub fn password_bytes(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.options.set_password(password.into());
        self
    }

    /// Set the password (UTF-8 string). This is a convenience wrapper around [`Self::password_bytes`].
    pub fn password(self, password: impl AsRef<str>) -> Self {
        self.password_bytes(password.as_ref().as_bytes())
    }

    /// Set the optional BMC key (`Kg`) for "two-key" logins.
    ///
    /// If not set, the password key is used ("one-key" login), which is common in many BMC default configs.
    pub fn bmc_key_bytes(mut self, kg: impl Into<Vec<u8>>) -> Self {
        self.options.set_bmc_key(kg.into());
        self
    }

    /// Set the optional BMC key (`Kg`) for "two-key" logins (UTF-8 string).
    pub fn bmc_key(self, kg: impl AsRef<str>) -> Self {
        self.bmc_key_bytes(kg.as_ref().as_bytes())
    }

    /// Set requested session privilege level.
    ///
    /// Lower levels are tried if the BMC rejects the requested role.
    pub fn privilege_level(mut self, level: PrivilegeLevel) -> Self {
        self.options.privilege = level;
        self
    }

    /// Set the per-call response deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the number of sends per handshake message (including the first).
    ///
    /// Application requests are never retried.
    pub fn retries(mut self, attempts: u32) -> Self {
        self.options.attempts = attempts;
        self
    }

    /// Set cipher suites to offer, most preferred first.
    pub fn cipher_suites(mut self, suites: impl Into<Vec<CipherSuite>>) -> Self {
        self.options.cipher_suites = suites.into();
        self
    }

    /// Set cipher suites by standard ID (0, 1, 2, 3, 15, 16, 17).
    pub fn cipher_suite_ids(mut self, ids: &[u8]) -> Result<Self> {
        self.options.cipher_suites = ids
            .iter()
            .map(|&id| CipherSuite::from_id(id))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    fn connect(&self) -> Result<UdpTransport> {
        let transport = UdpTransport::connect(self.target);
        crate::observe::connection_opened(&transport);
        transport
    }

    /// Establish the session over UDP and build the [`Client`].
    pub fn build(self) -> Result<Client> {
        let transport = self.connect()?;
        self.build_with_transport(transport)
    }

    /// Establish the session over a caller-supplied transport.
    pub fn build_with_transport<T>(self, transport: T) -> Result<Client>
    where
        T: Transport + Send + Sync + 'static,
    {
        let config = self.options.handshake_config()?;
        crate::observe::handshake_started();
        let session = establish_session(&transport, &config);
        crate::observe::handshake_finished(&session);
        let session = session?;

        Ok(Client::from_parts(
            Box::new(transport),
            session,
            self.options.timeout,
        ))
    }

    /// Build a client that talks to the BMC without a session.
    ///
    /// Only commands a BMC accepts outside a session (such as
    /// `Get Channel Authentication Capabilities`) will succeed.
    pub fn build_sessionless(self) -> Result<Client> {
        let transport = self.connect()?;
        Ok(Client::from_parts(
            Box::new(transport),
            Session::sessionless(),
            self.options.timeout,
        ))
    }
}

impl Client {
    /// Create a [`ClientBuilder`].
    pub fn builder(target: SocketAddr) -> ClientBuilder {
        ClientBuilder::new(target)
    }

    /// Create a [`ClientBuilder`] for `host[:port]`; the port defaults to 623.
    pub fn builder_for(target: &str) -> Result<ClientBuilder> {
        Ok(ClientBuilder::new(resolve_target(target)?))
    }

    fn from_parts(
        transport: Box<dyn Transport + Send + Sync>,
        session: Session,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                state: Mutex::new(Inner {
                    core: ClientCore::new(session),
                    mailbox: HashMap::new(),
                    reader_active: false,
                }),
                delivered: Condvar::new(),
                timeout,
            }),
        }
    }

    /// Execute a typed command (single request/response).
    pub fn execute<C: Command>(&self, command: C) -> Result<C::Output> {
        let request_data = command.request_data();
        let response = self.send(C::OPERATION, &request_data)?;
        command.parse_response(response)
    }

    /// Send a request and wait for its response until the configured timeout.
    pub fn send(&self, operation: Operation, data: &[u8]) -> Result<RawResponse> {
        self.send_with_timeout(operation, data, self.shared.timeout)
    }

    /// Send a request and wait for its response until `timeout` elapses.
    ///
    /// On timeout the request's sequence number is released and
    /// [`Error::Timeout`] is returned; the request is not retried.
    pub fn send_with_timeout(
        &self,
        operation: Operation,
        data: &[u8],
        timeout: Duration,
    ) -> Result<RawResponse> {
        let start = Instant::now();
        let result = self.round_trip(operation, data, start + timeout);
        crate::observe::request(crate::observe::Mode::Blocking, operation, start, &result);
        result
    }

    /// Send a raw IPMI request and return the raw response.
    ///
    /// This method uses LUN=0 and addresses commonly used for LAN sessions
    /// (`rsAddr=0x20`, `rqAddr=0x81`).
    pub fn send_raw(&self, netfn: u8, cmd: u8, data: &[u8]) -> Result<RawResponse> {
        if netfn > 0x3F {
            return Err(Error::InvalidArgument("network function must be 6-bit"));
        }
        self.send(Operation::new(NetworkFunction::new(netfn), cmd), data)
    }

    fn round_trip(&self, operation: Operation, data: &[u8], deadline: Instant) -> Result<RawResponse> {
        let (seq, packet) = self.lock_inner()?.core.build_request(operation, data)?;

        if let Err(err) = self.shared.transport.send(&packet) {
            self.lock_inner()?.core.release(seq);
            return Err(err);
        }

        self.wait_for(seq, deadline)
    }

    // One waiter at a time reads the socket and files every matched response
    // into the mailbox; the others sleep on the condvar until woken.
    fn wait_for(&self, seq: u8, deadline: Instant) -> Result<RawResponse> {
        let mut inner = self.lock_inner()?;
        loop {
            if let Some(response) = inner.mailbox.remove(&seq) {
                return Ok(response);
            }
            if inner.core.is_closed() {
                inner.core.release(seq);
                return Err(Error::SessionClosed);
            }

            let now = Instant::now();
            if now >= deadline {
                inner.core.release(seq);
                return Err(Error::Timeout);
            }

            if inner.reader_active {
                let (guard, _) = self
                    .shared
                    .delivered
                    .wait_timeout(inner, deadline - now)
                    .map_err(|_| Error::Protocol("client lock poisoned"))?;
                inner = guard;
                continue;
            }

            inner.reader_active = true;
            drop(inner);
            let received = self.shared.transport.recv(deadline);
            inner = self.lock_inner()?;
            inner.reader_active = false;
            self.shared.delivered.notify_all();

            match received {
                Ok(datagram) => match inner.core.accept_response(&datagram) {
                    Ok(Some((owner, response))) => {
                        inner.mailbox.insert(owner, response);
                    }
                    Ok(None) => {}
                    Err(err) => log_undecodable(&err),
                },
                Err(Error::Timeout) => {}
                Err(err) => {
                    inner.core.release(seq);
                    return Err(err);
                }
            }
        }
    }

    /// Convenience wrapper for `Get Device ID` (App NetFn, cmd 0x01).
    pub fn get_device_id(&self) -> Result<DeviceId> {
        self.execute(GetDeviceId)
    }

    /// Convenience wrapper for `Get System GUID` (App NetFn, cmd 0x37).
    pub fn get_system_guid(&self) -> Result<SystemGuid> {
        self.execute(GetSystemGuid)
    }

    /// Convenience wrapper for `Get Chassis Status` (Chassis NetFn, cmd 0x01).
    pub fn get_chassis_status(&self) -> Result<ChassisStatus> {
        self.execute(GetChassisStatus)
    }

    /// Run `Chassis Control` (Chassis NetFn, cmd 0x02).
    pub fn chassis_control(&self, control: ChassisControl) -> Result<()> {
        self.execute(ChassisControlCommand { control })
    }

    /// Convenience wrapper for `Get Channel Authentication Capabilities`
    /// (App NetFn, cmd 0x38).
    pub fn get_channel_auth_capabilities(
        &self,
        channel: u8,
        privilege: PrivilegeLevel,
    ) -> Result<ChannelAuthCapabilities> {
        let cmd = GetChannelAuthCapabilities::new(channel, privilege);
        match self.execute(cmd) {
            Ok(caps) => Ok(caps),
            Err(Error::CompletionCode { .. }) => self.execute(cmd.without_v2_data()),
            Err(e) => Err(e),
        }
    }

    /// The managed system (BMC) session ID, or 0 when sessionless.
    pub fn managed_session_id(&self) -> Result<u32> {
        Ok(self.lock_inner()?.core.session().managed_session_id())
    }

    /// The privilege level the session was opened with, if any.
    pub fn privilege_level(&self) -> Result<Option<PrivilegeLevel>> {
        Ok(self.lock_inner()?.core.session().privilege())
    }

    /// The negotiated cipher suite.
    pub fn cipher_suite(&self) -> Result<CipherSuite> {
        Ok(self.lock_inner()?.core.session().suite())
    }

    /// The BMC GUID reported during RAKP.
    pub fn bmc_guid(&self) -> Result<[u8; 16]> {
        Ok(self.lock_inner()?.core.session().bmc_guid())
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock_inner()
            .map(|inner| inner.core.is_closed())
            .unwrap_or(true)
    }

    /// Close the active RMCP+ session (App NetFn, cmd 0x3C).
    ///
    /// This is a best-effort operation. If the BMC does not respond (timeout) the client still
    /// transitions to a locally closed state and will reject further requests.
    pub fn close_session(&self) -> Result<()> {
        let session_id = {
            let inner = self.lock_inner()?;
            if inner.core.is_closed() {
                return Ok(());
            }
            if inner.core.session().is_sessionless() {
                drop(inner);
                self.mark_closed()?;
                return Ok(());
            }
            inner.core.session().managed_session_id()
        };

        let result = self.execute(CloseSession { session_id });
        self.mark_closed()?;

        match result {
            Ok(()) => Ok(()),
            // Invalid session ID: the BMC already forgot the session.
            Err(Error::CompletionCode {
                completion_code: CompletionCode::INVALID_SESSION_ID,
            }) => Ok(()),
            Err(Error::Timeout) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// A service-style grouping for App netfn commands.
    pub fn app(&self) -> AppService {
        AppService {
            client: self.clone(),
        }
    }

    /// A service-style grouping for Chassis netfn commands.
    pub fn chassis(&self) -> ChassisService {
        ChassisService {
            client: self.clone(),
        }
    }

    fn mark_closed(&self) -> Result<()> {
        self.lock_inner()?.core.mark_closed();
        self.shared.delivered.notify_all();
        Ok(())
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>> {
        self.shared
            .state
            .lock()
            .map_err(|_| Error::Protocol("client lock poisoned"))
    }
}

/// App NetFn service.
#[derive(Clone)]
pub struct AppService {
    client: Client,
}

impl AppService {
    /// `Get Device ID` (App NetFn, cmd 0x01).
    pub fn get_device_id(&self) -> Result<DeviceId> {
        self.client.get_device_id()
    }

    /// `Get System GUID` (App NetFn, cmd 0x37).
    pub fn get_system_guid(&self) -> Result<SystemGuid> {
        self.client.get_system_guid()
    }

    /// `Get Channel Authentication Capabilities` (App NetFn, cmd 0x38).
    pub fn get_channel_auth_capabilities(
        &self,
        channel: u8,
        privilege: PrivilegeLevel,
    ) -> Result<ChannelAuthCapabilities> {
        self.client
            .get_channel_auth_capabilities(channel, privilege)
    }
}

/// Chassis NetFn service.
#[derive(Clone)]
pub struct ChassisService {
    client: Client,
}

impl ChassisService {
    /// `Get Chassis Status` (Chassis NetFn, cmd 0x01).
    pub fn get_chassis_status(&self) -> Result<ChassisStatus> {
        self.client.get_chassis_status()
    }

    /// `Chassis Control` (Chassis NetFn, cmd 0x02).
    pub fn chassis_control(&self, control: ChassisControl) -> Result<()> {
        self.client.chassis_control(control)
    }
}
