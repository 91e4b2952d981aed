// ABOUTME: SMPP session lifecycle and request multiplexer over one TCP connection
// ABOUTME: Runs a reader task and optional keepalive, correlating responses by sequence number

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::connection::{FrameReader, FrameWriter, Inbound};
use crate::pdu::{CommandId, CommandStatus, FieldName, Pdu};

pub mod config;
pub mod error;
pub mod rate;

pub use config::{BindMode, SessionConfig, INTERFACE_VERSION_34};
pub use error::{SmppError, SmppResult};
pub use rate::RateLimiter;

/// Sequence numbers live in `[1, 0x7FFF_FFFF]` and wrap back to 1.
const MAX_SEQUENCE: u32 = 0x7FFF_FFFF;

/// Future returned by an unsolicited-PDU handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback for unsolicited PDUs (deliver_sm and friends). Invoked inline
/// from the reader task, so it must not block indefinitely; writing a reply
/// through the provided [`Conn`] is safe.
pub type Handler = Arc<dyn Fn(Conn, Pdu) -> HandlerFuture + Send + Sync>;

/// A handler that answers every unsolicited request with its empty paired
/// response, echoing the sequence number.
pub fn echo_handler() -> Handler {
    Arc::new(|conn, pdu| {
        Box::pin(async move {
            if let Some(resp) = pdu.response() {
                if let Err(err) = conn.send(&resp).await {
                    tracing::warn!(error = %err, "echo reply failed");
                }
            }
        })
    })
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
    BindFailed,
    Closed,
}

struct Waiter {
    tx: oneshot::Sender<Pdu>,
    /// Whether this entry counts against the configured window.
    windowed: bool,
}

#[derive(Default)]
struct Inflight {
    waiters: HashMap<u32, Waiter>,
    windowed: usize,
}

struct Inner {
    config: SessionConfig,
    status: watch::Sender<SessionStatus>,
    sequence: AtomicU32,
    inflight: Mutex<Inflight>,
    writer: tokio::sync::Mutex<Option<FrameWriter>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// An SMPP client session.
///
/// Created Idle; [`bind`](Session::bind) connects and authenticates, after
/// which concurrent callers may issue requests. All socket writes pass
/// through one gate so frames are never interleaved, and a single reader
/// task correlates responses to callers by sequence number.
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Session {
        let (status, _) = watch::channel(SessionStatus::Idle);
        Session {
            inner: Arc::new(Inner {
                config,
                status,
                sequence: AtomicU32::new(0),
                inflight: Mutex::new(Inflight::default()),
                writer: tokio::sync::Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a session and bind it in one step.
    pub async fn connect(config: SessionConfig) -> SmppResult<Session> {
        let session = Session::new(config);
        session.bind().await?;
        Ok(session)
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.current_status()
    }

    /// A cheap write handle onto this session.
    pub fn conn(&self) -> Conn {
        Conn {
            inner: self.inner.clone(),
        }
    }

    /// Connect to the SMSC and perform the bind handshake. On success the
    /// reader and keepalive tasks are running and the session is Connected.
    pub async fn bind(&self) -> SmppResult<()> {
        let inner = &self.inner;

        let mut claimed = false;
        inner.status.send_if_modified(|status| {
            if matches!(status, SessionStatus::Idle | SessionStatus::Closed) {
                *status = SessionStatus::Connecting;
                claimed = true;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(SmppError::AlreadyBound);
        }

        match Self::handshake(inner).await {
            Ok(reader) => {
                inner.status.send_replace(SessionStatus::Connected);
                let mut tasks = inner.tasks.lock().unwrap();
                tasks.push(tokio::spawn(read_loop(inner.clone(), reader)));
                if inner.config.enquire_link > Duration::ZERO {
                    tasks.push(tokio::spawn(keepalive_loop(inner.clone())));
                }
                Ok(())
            }
            Err(err) => {
                if matches!(err, SmppError::BindFailed(_)) {
                    inner.status.send_replace(SessionStatus::BindFailed);
                }
                inner.status.send_replace(SessionStatus::Closed);
                Err(err)
            }
        }
    }

    async fn handshake(inner: &Arc<Inner>) -> SmppResult<FrameReader> {
        let config = &inner.config;
        let stream = TcpStream::connect(&config.addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);
        let mut writer = FrameWriter::new(write_half);

        inner.sequence.store(1, Ordering::Relaxed);
        {
            let mut inflight = inner.inflight.lock().unwrap();
            inflight.waiters.clear();
            inflight.windowed = 0;
        }

        let mut bind = Pdu::new(config.bind_mode.command());
        bind.sequence_number = 1;
        bind.fields.set_str(FieldName::SystemId, &config.system_id);
        bind.fields.set_str(FieldName::Password, &config.password);
        bind.fields.set_str(FieldName::SystemType, &config.system_type);
        bind.fields.set(
            FieldName::InterfaceVersion,
            crate::pdu::Value::Fixed(config.interface_version),
        );
        bind.fields
            .set(FieldName::AddrTon, crate::pdu::Value::Fixed(config.addr_ton));
        bind.fields
            .set(FieldName::AddrNpi, crate::pdu::Value::Fixed(config.addr_npi));
        bind.fields
            .set_str(FieldName::AddressRange, &config.address_range);
        writer.write(&bind).await?;

        let wait = Self::await_bind_resp(&mut reader);
        let resp = match config.effective_resp_timeout() {
            Some(deadline) => tokio::time::timeout(deadline, wait)
                .await
                .map_err(|_| SmppError::Timeout)??,
            None => wait.await?,
        };

        if resp.command_status != 0 {
            let _ = writer.shutdown().await;
            return Err(SmppError::BindFailed(resp.command_status));
        }

        *inner.writer.lock().await = Some(writer);
        Ok(reader)
    }

    async fn await_bind_resp(reader: &mut FrameReader) -> SmppResult<Pdu> {
        loop {
            match reader.read().await? {
                Inbound::Frame(pdu) if pdu.is_response() && pdu.sequence_number == 1 => {
                    return Ok(pdu)
                }
                Inbound::Frame(pdu) => {
                    tracing::warn!(command_id = pdu.command_id, "dropping PDU received before bind completed");
                }
                Inbound::Malformed { sequence_number } => {
                    tracing::warn!(sequence_number, "malformed PDU during bind");
                }
                Inbound::Eof => {
                    return Err(SmppError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed during bind",
                    )))
                }
            }
        }
    }

    /// Send one request PDU and wait for its correlated response.
    ///
    /// The call fails fast with [`SmppError::NotConnected`] outside the
    /// Connected state and with [`SmppError::MaxWindowSize`] when the window
    /// is full; it does not queue. A configured rate limiter is consulted
    /// before the sequence number is allocated.
    pub async fn request(&self, pdu: Pdu) -> SmppResult<Pdu> {
        self.inner
            .request(pdu, true, self.inner.config.effective_resp_timeout())
            .await
    }

    /// Graceful shutdown: unbind, await the response, close the socket.
    pub async fn unbind(&self) -> SmppResult<()> {
        let result = self
            .inner
            .request(
                Pdu::new(CommandId::Unbind),
                false,
                self.inner.config.effective_resp_timeout(),
            )
            .await;
        self.close().await;
        match result {
            Ok(resp) if resp.ok() => Ok(()),
            Ok(resp) => Err(SmppError::Smpp(resp.command_status)),
            // The peer tearing the connection down right after unbind is a
            // clean outcome.
            Err(SmppError::NotConnected) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Close the session. All in-flight callers fail with
    /// [`SmppError::NotConnected`]; calling close again is a no-op.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.close_nowait();
    }
}

/// Write capability handed to unsolicited-PDU handlers (and available via
/// [`Session::conn`]). Clones share the session.
#[derive(Clone)]
pub struct Conn {
    inner: Arc<Inner>,
}

impl Conn {
    /// Write one PDU. The write gate keeps frames whole on the wire.
    pub async fn send(&self, pdu: &Pdu) -> SmppResult<()> {
        self.inner.write(pdu).await
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.current_status()
    }
}

impl Inner {
    fn current_status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    fn next_sequence(&self) -> u32 {
        let prev = self
            .sequence
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(if v >= MAX_SEQUENCE { 1 } else { v + 1 })
            })
            .expect("sequence update never fails");
        if prev >= MAX_SEQUENCE {
            1
        } else {
            prev + 1
        }
    }

    async fn request(
        self: &Arc<Inner>,
        mut pdu: Pdu,
        gated: bool,
        deadline: Option<Duration>,
    ) -> SmppResult<Pdu> {
        if self.current_status() != SessionStatus::Connected {
            return Err(SmppError::NotConnected);
        }

        if gated {
            if let Some(limiter) = &self.config.rate_limiter {
                let mut status_rx = self.status.subscribe();
                tokio::select! {
                    _ = limiter.acquire() => {}
                    _ = status_rx.wait_for(|s| *s != SessionStatus::Connected) => {
                        return Err(SmppError::Cancelled)
                    }
                }
            }
        }

        pdu.sequence_number = self.next_sequence();
        let seq = pdu.sequence_number;

        let rx = {
            let mut inflight = self.inflight.lock().unwrap();
            let window = self.config.window_size;
            if gated && window > 0 && inflight.windowed >= window as usize {
                return Err(SmppError::MaxWindowSize);
            }
            let (tx, rx) = oneshot::channel();
            inflight.waiters.insert(seq, Waiter { tx, windowed: gated });
            if gated {
                inflight.windowed += 1;
            }
            rx
        };

        if let Err(err) = self.write(&pdu).await {
            self.remove_waiter(seq);
            return Err(err);
        }

        match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(resp)) => Ok(resp),
                Ok(Err(_)) => Err(SmppError::NotConnected),
                Err(_) => {
                    self.remove_waiter(seq);
                    Err(SmppError::Timeout)
                }
            },
            None => rx.await.map_err(|_| SmppError::NotConnected),
        }
    }

    fn remove_waiter(&self, sequence_number: u32) -> Option<Waiter> {
        let mut inflight = self.inflight.lock().unwrap();
        let waiter = inflight.waiters.remove(&sequence_number)?;
        if waiter.windowed {
            inflight.windowed -= 1;
        }
        Some(waiter)
    }

    /// Write one frame under the write gate. A transport error terminates
    /// the session.
    async fn write(&self, pdu: &Pdu) -> SmppResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SmppError::NotConnected)?;
        match writer.write(pdu).await {
            Ok(()) => Ok(()),
            Err(err) => {
                drop(guard);
                tracing::warn!(error = %err, "write failed, closing session");
                self.close().await;
                Err(SmppError::Io(err))
            }
        }
    }

    async fn dispatch(self: &Arc<Inner>, pdu: Pdu) {
        if let Some(waiter) = self.remove_waiter(pdu.sequence_number) {
            let _ = waiter.tx.send(pdu);
            return;
        }

        if !pdu.is_response() {
            // Link checks from the peer are answered without involving the
            // application.
            if pdu.id() == Some(CommandId::EnquireLink) {
                if let Some(resp) = pdu.response() {
                    let _ = self.write(&resp).await;
                }
                return;
            }
            if let Some(handler) = &self.config.handler {
                let conn = Conn {
                    inner: self.clone(),
                };
                handler(conn, pdu).await;
            } else {
                tracing::debug!(
                    command_id = pdu.command_id,
                    "no handler configured, dropping unsolicited PDU"
                );
            }
            return;
        }

        tracing::warn!(
            sequence_number = pdu.sequence_number,
            "orphan response dropped"
        );
    }

    async fn close(&self) {
        if !self.begin_close() {
            return;
        }
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            let _ = writer.shutdown().await;
        }
        drop(guard);
        self.abort_tasks();
    }

    /// Flip to Closed and fail every waiter. Returns false when the session
    /// was already closed.
    fn begin_close(&self) -> bool {
        let mut started = false;
        self.status.send_if_modified(|status| {
            if *status == SessionStatus::Closed {
                false
            } else {
                *status = SessionStatus::Closed;
                started = true;
                true
            }
        });
        if !started {
            return false;
        }
        let mut inflight = self.inflight.lock().unwrap();
        // Dropping the senders resolves every waiter with NotConnected.
        inflight.waiters.clear();
        inflight.windowed = 0;
        true
    }

    /// Close without touching the socket; used from Drop where we cannot
    /// await. The socket closes when the aborted tasks release it.
    fn close_nowait(&self) {
        if self.begin_close() {
            self.abort_tasks();
        }
    }

    fn abort_tasks(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

/// The session's single reader: frames bytes, then dispatches. A malformed
/// body for a known command is answered with `generic_nack`; header-level
/// failures and EOF close the session.
async fn read_loop(inner: Arc<Inner>, mut reader: FrameReader) {
    loop {
        match reader.read().await {
            Ok(Inbound::Frame(pdu)) => inner.dispatch(pdu).await,
            Ok(Inbound::Malformed { sequence_number }) => {
                let mut nack = Pdu::new(CommandId::GenericNack);
                nack.command_status = CommandStatus::SystemError as u32;
                nack.sequence_number = sequence_number;
                if inner.write(&nack).await.is_err() {
                    return;
                }
            }
            Ok(Inbound::Eof) => {
                tracing::debug!("peer closed the session");
                inner.close().await;
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "read failed, closing session");
                inner.close().await;
                return;
            }
        }
    }
}

/// Periodic enquire_link. The response is correlated through the in-flight
/// table like any other request, outside the submit window.
async fn keepalive_loop(inner: Arc<Inner>) {
    let interval = inner.config.enquire_link;
    let deadline = inner.config.effective_resp_timeout().unwrap_or(interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // the immediate first tick

    loop {
        ticker.tick().await;
        if inner.current_status() != SessionStatus::Connected {
            return;
        }
        match inner
            .request(Pdu::new(CommandId::EnquireLink), false, Some(deadline))
            .await
        {
            Ok(_) => {}
            Err(SmppError::Timeout) => tracing::warn!("enquire_link response overdue"),
            Err(_) => return,
        }
    }
}
