use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

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
use crate::session::{Session, establish_session_async};
use crate::transport::{AsyncTransport, TokioUdpTransport, resolve_target};
use crate::types::{
    ChannelAuthCapabilities, ChassisControl, ChassisStatus, DeviceId, PrivilegeLevel, RawResponse,
    SystemGuid,
};

/// An async IPMI v2.0 RMCP+ client for the tokio runtime.
///
/// Clones share one session; any number of tasks may have requests in
/// flight at once.
#[derive(Clone)]
pub struct AsyncClient {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Box<dyn AsyncTransport + Send + Sync>,
    state: Mutex<Inner>,
    // Held by whichever task is currently reading the socket.
    reader: tokio::sync::Mutex<()>,
    timeout: Duration,
}

struct Inner {
    core: ClientCore,
    waiters: HashMap<u8, oneshot::Sender<RawResponse>>,
}

/// Builder for [`AsyncClient`].
#[derive(Debug)]
pub struct AsyncClientBuilder {
    target: SocketAddr,
    options: SessionOptions,
}

impl AsyncClientBuilder {
    /// Create a new builder.
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            options: SessionOptions::default(),
        }
    }

    /// Set the username (bytes).
    pub fn username_bytes(mut self, username: impl Into<Vec<u8>>) -> Self {
        self.options.username = Some(username.into());
        self
    }

    /// Set the username (UTF-8 string).
    pub fn username(self, username: impl AsRef<str>) -> Self {
        self.username_bytes(username.as_ref().as_bytes())
    }

    /// Set the password (bytes).
    pub fn password_bytes(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.options.set_password(password.into());
        self
    }

    /// Set the password (UTF-8 string).
    pub fn password(self, password: impl AsRef<str>) -> Self {
        self.password_bytes(password.as_ref().as_bytes())
    }

    /// Set the optional BMC key (`Kg`) for "two-key" logins.
    pub fn bmc_key_bytes(mut self, kg: impl Into<Vec<u8>>) -> Self {
        self.options.set_bmc_key(kg.into());
        self
    }

    /// Set the optional BMC key (`Kg`) for "two-key" logins (UTF-8 string).
    pub fn bmc_key(self, kg: impl AsRef<str>) -> Self {
        self.bmc_key_bytes(kg.as_ref().as_bytes())
    }

    /// Set requested session privilege level.
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
    pub fn retries(mut self, attempts: u32) -> Self {
        self.options.attempts = attempts;
        self
    }

    /// Set cipher suites to offer, most preferred first.
    pub fn cipher_suites(mut self, suites: impl Into<Vec<CipherSuite>>) -> Self {
        self.options.cipher_suites = suites.into();
        self
    }

    async fn connect(&self) -> Result<TokioUdpTransport> {
        let transport = TokioUdpTransport::connect(self.target).await;
        crate::observe::connection_opened(&transport);
        transport
    }

    /// Establish the session over UDP and build the [`AsyncClient`].
    pub async fn build(self) -> Result<AsyncClient> {
        let transport = self.connect().await?;
        self.build_with_transport(transport).await
    }

    /// Establish the session over a caller-supplied transport.
    pub async fn build_with_transport<T>(self, transport: T) -> Result<AsyncClient>
    where
        T: AsyncTransport + Send + Sync + 'static,
    {
        let config = self.options.handshake_config()?;
        crate::observe::handshake_started();
        let session = establish_session_async(&transport, &config).await;
        crate::observe::handshake_finished(&session);
        let session = session?;

        Ok(AsyncClient::from_parts(
            Box::new(transport),
            session,
            self.options.timeout,
        ))
    }

    /// Build a client that talks to the BMC without a session.
    pub async fn build_sessionless(self) -> Result<AsyncClient> {
        let transport = self.connect().await?;
        Ok(AsyncClient::from_parts(
            Box::new(transport),
            Session::sessionless(),
            self.options.timeout,
        ))
    }
}

impl AsyncClient {
    /// Create an [`AsyncClientBuilder`].
    pub fn builder(target: SocketAddr) -> AsyncClientBuilder {
        AsyncClientBuilder::new(target)
    }

    /// Create an [`AsyncClientBuilder`] for `host[:port]`; the port defaults to 623.
    pub fn builder_for(target: &str) -> Result<AsyncClientBuilder> {
        Ok(AsyncClientBuilder::new(resolve_target(target)?))
    }

    fn from_parts(
        transport: Box<dyn AsyncTransport + Send + Sync>,
        session: Session,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                state: Mutex::new(Inner {
                    core: ClientCore::new(session),
                    waiters: HashMap::new(),
                }),
                reader: tokio::sync::Mutex::new(()),
                timeout,
            }),
        }
    }

    /// Execute a typed command (single request/response).
    pub async fn execute<C: Command>(&self, command: C) -> Result<C::Output> {
        let request_data = command.request_data();
        let response = self.send(C::OPERATION, &request_data).await?;
        command.parse_response(response)
    }

    /// Send a request and wait for its response until the configured timeout.
    pub async fn send(&self, operation: Operation, data: &[u8]) -> Result<RawResponse> {
        self.send_with_timeout(operation, data, self.shared.timeout)
            .await
    }

    /// Send a request and wait for its response until `timeout` elapses.
    pub async fn send_with_timeout(
        &self,
        operation: Operation,
        data: &[u8],
        timeout: Duration,
    ) -> Result<RawResponse> {
        let start = Instant::now();
        let result = self.round_trip(operation, data, start + timeout).await;
        crate::observe::request(crate::observe::Mode::Tokio, operation, start, &result);
        result
    }

    /// Send a raw IPMI request and return the raw response.
    pub async fn send_raw(&self, netfn: u8, cmd: u8, data: &[u8]) -> Result<RawResponse> {
        if netfn > 0x3F {
            return Err(Error::InvalidArgument("network function must be 6-bit"));
        }
        self.send(Operation::new(NetworkFunction::new(netfn), cmd), data)
            .await
    }

    async fn round_trip(
        &self,
        operation: Operation,
        data: &[u8],
        deadline: Instant,
    ) -> Result<RawResponse> {
        let (seq, packet, rx) = {
            let mut inner = self.lock_inner()?;
            let (seq, packet) = inner.core.build_request(operation, data)?;
            let (tx, rx) = oneshot::channel();
            inner.waiters.insert(seq, tx);
            (seq, packet, rx)
        };

        if let Err(err) = self.shared.transport.send(&packet).await {
            self.abandon(seq);
            return Err(err);
        }

        let result = tokio::time::timeout_at(
            tokio::time::Instant::from_std(deadline),
            self.wait_for(rx, deadline),
        )
        .await
        .unwrap_or(Err(Error::Timeout));

        if result.is_err() {
            self.abandon(seq);
        }
        result
    }

    async fn wait_for(
        &self,
        mut rx: oneshot::Receiver<RawResponse>,
        deadline: Instant,
    ) -> Result<RawResponse> {
        loop {
            tokio::select! {
                biased;
                delivered = &mut rx => {
                    return delivered.map_err(|_| Error::SessionClosed);
                }
                _reader = self.shared.reader.lock() => {
                    // Another reader may have delivered ours while we queued.
                    match rx.try_recv() {
                        Ok(response) => return Ok(response),
                        Err(oneshot::error::TryRecvError::Closed) => {
                            return Err(Error::SessionClosed);
                        }
                        Err(oneshot::error::TryRecvError::Empty) => {}
                    }
                    match self.shared.transport.recv(deadline).await {
                        Ok(datagram) => self.route(&datagram)?,
                        Err(Error::Timeout) => {}
                        Err(err) => return Err(err),
                    }
                }
            }
        }
    }

    fn route(&self, datagram: &[u8]) -> Result<()> {
        let mut inner = self.lock_inner()?;
        match inner.core.accept_response(datagram) {
            Ok(Some((seq, response))) => {
                if let Some(tx) = inner.waiters.remove(&seq) {
                    // The waiter may have given up in the meantime.
                    let _ = tx.send(response);
                }
            }
            Ok(None) => {}
            Err(err) => log_undecodable(&err),
        }
        Ok(())
    }

    fn abandon(&self, seq: u8) {
        if let Ok(mut inner) = self.lock_inner() {
            if inner.waiters.remove(&seq).is_some() {
                inner.core.release(seq);
            }
        }
    }

    /// Convenience wrapper for `Get Device ID` (App NetFn, cmd 0x01).
    pub async fn get_device_id(&self) -> Result<DeviceId> {
        self.execute(GetDeviceId).await
    }

    /// Convenience wrapper for `Get System GUID` (App NetFn, cmd 0x37).
    pub async fn get_system_guid(&self) -> Result<SystemGuid> {
        self.execute(GetSystemGuid).await
    }

    /// Convenience wrapper for `Get Chassis Status` (Chassis NetFn, cmd 0x01).
    pub async fn get_chassis_status(&self) -> Result<ChassisStatus> {
        self.execute(GetChassisStatus).await
    }

    /// Run `Chassis Control` (Chassis NetFn, cmd 0x02).
    pub async fn chassis_control(&self, control: ChassisControl) -> Result<()> {
        self.execute(ChassisControlCommand { control }).await
    }

    /// Convenience wrapper for `Get Channel Authentication Capabilities`.
    pub async fn get_channel_auth_capabilities(
        &self,
        channel: u8,
        privilege: PrivilegeLevel,
    ) -> Result<ChannelAuthCapabilities> {
        let cmd = GetChannelAuthCapabilities::new(channel, privilege);
        match self.execute(cmd).await {
            Ok(caps) => Ok(caps),
            Err(Error::CompletionCode { .. }) => self.execute(cmd.without_v2_data()).await,
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
    /// A timeout or an "invalid session ID" answer still leaves the client
    /// closed and is not reported as an error.
    pub async fn close_session(&self) -> Result<()> {
        let session_id = {
            let inner = self.lock_inner()?;
            if inner.core.is_closed() {
                return Ok(());
            }
            if inner.core.session().is_sessionless() {
                None
            } else {
                Some(inner.core.session().managed_session_id())
            }
        };

        let result = match session_id {
            Some(session_id) => self.execute(CloseSession { session_id }).await,
            None => Ok(()),
        };
        self.mark_closed()?;

        match result {
            Ok(()) => Ok(()),
            Err(Error::CompletionCode {
                completion_code: CompletionCode::INVALID_SESSION_ID,
            }) => Ok(()),
            Err(Error::Timeout) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn mark_closed(&self) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.core.mark_closed();
        // Dropping the senders wakes every waiter with `SessionClosed`.
        inner.waiters.clear();
        Ok(())
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>> {
        self.shared
            .state
            .lock()
            .map_err(|_| Error::Protocol("client lock poisoned"))
    }
}
