//! Minecraft RCON Host
//!
//! Runs commands on the game server's console over the RCON protocol.
//!
//! # Framing
//!
//! Every packet is little-endian:
//!
//! ```text
//! i32 length | i32 request id | i32 type | payload | 0x00 | 0x00
//! ```
//!
//! `length` counts everything after itself. Types: `3` login, `2` command
//! (and login answer), `0` command answer. A login answer with request id
//! `-1` means the password was rejected.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::application::ports::{CommandHost, HostError};

use super::reconnect::{ReconnectConfig, ReconnectPolicy};

const PACKET_LOGIN: i32 = 3;
const PACKET_COMMAND: i32 = 2;
const PACKET_AUTH_RESPONSE: i32 = 2;
const PACKET_RESPONSE: i32 = 0;

/// Largest command payload the server accepts from a client.
pub const MAX_COMMAND_BYTES: usize = 1446;

/// Largest packet body the server sends (4096 payload bytes plus header).
const MAX_INCOMING_BODY: usize = 4096 + 10;

/// Request id the server uses to reject a login.
const AUTH_FAILED_ID: i32 = -1;

// =============================================================================
// Errors
// =============================================================================

/// RCON client errors.
#[derive(Debug, thiserror::Error)]
pub enum RconError {
    /// Socket failure, including timeouts and a closed connection.
    #[error("rcon i/o error: {0}")]
    Io(#[from] io::Error),

    /// The server rejected the password.
    #[error("rcon authentication failed")]
    AuthenticationFailed,

    /// The server sent something that is not a valid packet.
    #[error("rcon protocol error: {0}")]
    Protocol(String),

    /// The command does not fit in one packet.
    #[error("command is {len} bytes, rcon accepts at most {MAX_COMMAND_BYTES}")]
    PayloadTooLarge {
        /// Command length in bytes.
        len: usize,
    },

    /// The address did not resolve.
    #[error("rcon address {0} did not resolve")]
    Unresolved(String),
}

// =============================================================================
// Packets
// =============================================================================

/// One RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Request id chosen by the client and echoed by the server.
    pub request_id: i32,
    /// Packet type.
    pub kind: i32,
    /// Payload without the trailing NULs.
    pub payload: String,
}

impl Packet {
    /// Serialize to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload.as_bytes();
        let body_len = 4 + 4 + payload.len() + 2;
        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&i32::try_from(body_len).unwrap_or(i32::MAX).to_le_bytes());
        buf.extend_from_slice(&self.request_id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    /// Read one packet.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::Io`] on socket failure and
    /// [`RconError::Protocol`] on a bad length or missing terminator.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, RconError> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = i32::from_le_bytes(len_buf);

        let body_len = usize::try_from(len)
            .ok()
            .filter(|len| (10..=MAX_INCOMING_BODY).contains(len))
            .ok_or_else(|| RconError::Protocol(format!("invalid packet length {len}")))?;

        let mut body = vec![0u8; body_len];
        reader.read_exact(&mut body)?;

        let (header, rest) = body.split_at(8);
        let request_id = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let kind = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let payload = rest
            .strip_suffix(&[0u8, 0])
            .ok_or_else(|| RconError::Protocol("packet is not NUL terminated".to_string()))?;

        Ok(Self {
            request_id,
            kind,
            payload: String::from_utf8_lossy(payload).into_owned(),
        })
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Authenticated RCON session.
#[derive(Debug)]
pub struct RconConnection {
    stream: TcpStream,
    next_id: i32,
}

impl RconConnection {
    /// Connect and log in.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::AuthenticationFailed`] if the password is
    /// rejected, or an I/O or protocol error.
    pub fn open(address: &str, password: &str, timeout: Duration) -> Result<Self, RconError> {
        let socket = address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| RconError::Unresolved(address.to_string()))?;

        let stream = TcpStream::connect_timeout(&socket, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let mut conn = Self { stream, next_id: 0 };
        conn.login(password)?;
        Ok(conn)
    }

    /// Run one command and return the server's answer text.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::PayloadTooLarge`] without touching the socket if
    /// the command is too long, otherwise an I/O or protocol error.
    pub fn exec(&mut self, command: &str) -> Result<String, RconError> {
        if command.len() > MAX_COMMAND_BYTES {
            return Err(RconError::PayloadTooLarge { len: command.len() });
        }

        let request_id = self.send(PACKET_COMMAND, command)?;
        loop {
            let reply = Packet::read_from(&mut self.stream)?;
            if reply.kind == PACKET_RESPONSE && reply.request_id == request_id {
                return Ok(reply.payload);
            }
            tracing::trace!(
                request_id = reply.request_id,
                kind = reply.kind,
                "Ignoring unrelated rcon packet"
            );
        }
    }

    fn login(&mut self, password: &str) -> Result<(), RconError> {
        let request_id = self.send(PACKET_LOGIN, password)?;
        loop {
            let reply = Packet::read_from(&mut self.stream)?;
            if reply.kind != PACKET_AUTH_RESPONSE {
                // Some servers send an empty response packet first.
                continue;
            }
            if reply.request_id == AUTH_FAILED_ID {
                return Err(RconError::AuthenticationFailed);
            }
            if reply.request_id != request_id {
                return Err(RconError::Protocol(format!(
                    "login answer for request {} instead of {request_id}",
                    reply.request_id
                )));
            }
            return Ok(());
        }
    }

    fn send(&mut self, kind: i32, payload: &str) -> Result<i32, RconError> {
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let packet = Packet {
            request_id: self.next_id,
            kind,
            payload: payload.to_string(),
        };
        self.stream.write_all(&packet.encode())?;
        self.stream.flush()?;
        Ok(packet.request_id)
    }
}

// =============================================================================
// Host Adapter
// =============================================================================

/// RCON connection settings.
#[derive(Clone)]
pub struct RconConfig {
    /// Server `host:port`.
    pub address: String,
    /// RCON password.
    pub password: String,
    /// Connect, read and write timeout.
    pub io_timeout: Duration,
    /// Backoff between connection attempts.
    pub reconnect: ReconnectConfig,
}

impl std::fmt::Debug for RconConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconConfig")
            .field("address", &self.address)
            .field("password", &"[REDACTED]")
            .field("io_timeout", &self.io_timeout)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// [`CommandHost`] that runs commands through RCON.
///
/// Connects lazily and keeps the session open between dispatches. A broken
/// session is dropped and re-established on the next dispatch.
#[derive(Debug)]
pub struct RconHost {
    config: RconConfig,
    policy: ReconnectPolicy,
    connection: Option<RconConnection>,
}

impl RconHost {
    /// Create an unconnected host.
    #[must_use]
    pub fn new(config: RconConfig) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        Self {
            config,
            policy,
            connection: None,
        }
    }

    /// Whether a session is currently open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open the session now instead of on the first dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::AuthenticationFailed`] if the server rejects the
    /// password, or the last connection error once every attempt failed.
    pub fn preflight(&mut self) -> Result<(), RconError> {
        self.session().map(|_| ())
    }

    fn connect(&mut self) -> Result<RconConnection, RconError> {
        self.policy.reset();
        let mut last_error = RconError::Unresolved(self.config.address.clone());

        while self.policy.begin_attempt() {
            match RconConnection::open(
                &self.config.address,
                &self.config.password,
                self.config.io_timeout,
            ) {
                Ok(conn) => {
                    tracing::info!(address = %self.config.address, "Connected to rcon");
                    return Ok(conn);
                }
                Err(RconError::AuthenticationFailed) => return Err(RconError::AuthenticationFailed),
                Err(e) => last_error = e,
            }

            let Some(delay) = self.policy.next_delay() else {
                break;
            };
            tracing::warn!(
                address = %self.config.address,
                attempt = self.policy.attempts(),
                delay_ms = delay.as_millis(),
                error = %last_error,
                "Rcon connection failed, retrying"
            );
            std::thread::sleep(delay);
        }

        Err(last_error)
    }

    fn session(&mut self) -> Result<&mut RconConnection, RconError> {
        if self.connection.is_none() {
            let conn = self.connect()?;
            self.connection = Some(conn);
        }
        self.connection
            .as_mut()
            .ok_or_else(|| RconError::Protocol("session missing after connect".to_string()))
    }
}

impl CommandHost for RconHost {
    fn name(&self) -> &'static str {
        "rcon"
    }

    fn dispatch(&mut self, command: &str) -> Result<bool, HostError> {
        match self.session().and_then(|conn| conn.exec(command)) {
            Ok(answer) => {
                tracing::debug!(command, answer = %answer, "Rcon command answered");
                Ok(true)
            }
            Err(e @ RconError::PayloadTooLarge { .. }) => {
                tracing::warn!(error = %e, "Rcon refused command");
                Ok(false)
            }
            Err(e) => {
                self.connection = None;
                Err(HostError::Unavailable(e.to_string()))
            }
        }
    }
}
