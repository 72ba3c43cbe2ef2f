// Device client: one TCP connection per unit, newline-delimited JSON frames.
//
// The connection is opened lazily, reused while healthy, and discarded after
// any failure so the next call starts from a clean stream.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, trace};

use crate::auth::{PskSigner, SignedHeader};
use crate::error::Error;
use crate::frame::{Method, ReplyFrame, RequestFrame, SetPayload};
use crate::report::{AirflowMode, DeviceReport, VALID_DURATIONS};
use crate::transport::TransportConfig;

type Connection = Framed<TcpStream, LinesCodec>;

// ── Endpoint ─────────────────────────────────────────────────────────

/// Network address of a unit. `host` is a bare IP literal or host name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ── VentClient ───────────────────────────────────────────────────────

/// Client for a single ventilation unit.
///
/// Calls are serialized on an internal lock, so a client can be shared
/// behind an `Arc` but never has two exchanges in flight.
#[derive(Debug)]
pub struct VentClient {
    endpoint: Endpoint,
    device_id: String,
    signer: PskSigner,
    transport: TransportConfig,
    conn: Mutex<Option<Connection>>,
    next_request: AtomicU32,
}

impl VentClient {
    pub fn new(
        endpoint: Endpoint,
        device_id: impl Into<String>,
        signer: PskSigner,
        transport: TransportConfig,
    ) -> Self {
        Self {
            endpoint,
            device_id: device_id.into(),
            signer,
            transport,
            conn: Mutex::new(None),
            next_request: AtomicU32::new(1),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Open the connection now instead of on first use.
    pub async fn connect(&self) -> Result<(), Error> {
        let mut slot = self.conn.lock().await;
        if slot.is_none() {
            let conn = tokio::time::timeout(self.transport.timeout, self.open())
                .await
                .map_err(|_| self.timeout_error())??;
            *slot = Some(conn);
        }
        Ok(())
    }

    /// Read and validate the full status report.
    pub async fn read_status(&self) -> Result<DeviceReport, Error> {
        self.exchange(Method::Get, None, |frame| match frame {
            ReplyFrame::Response { p, .. } => DeviceReport::from_payload(&p),
            other => Err(Error::UnexpectedReply {
                expected: "'rsp' frame".into(),
                got: format!("{other:?}"),
            }),
        })
        .await
    }

    /// Switch the unit into `mode` for `duration_min` minutes.
    ///
    /// `duration_min` must be one of [`VALID_DURATIONS`]; anything else is
    /// rejected without contacting the device.
    pub async fn set_airflow_mode(
        &self,
        mode: AirflowMode,
        duration_min: u16,
    ) -> Result<(), Error> {
        if !VALID_DURATIONS.contains(&duration_min) {
            return Err(Error::InvalidArgument(format!(
                "duration must be one of {VALID_DURATIONS:?} minutes, got {duration_min}"
            )));
        }

        let payload = SetPayload {
            ar_af: mode.code(),
            ar_min: duration_min,
        };
        self.exchange(Method::Set, Some(payload), |_| Ok(())).await?;
        debug!(%mode, duration_min, "airflow mode accepted");
        Ok(())
    }

    /// Close the connection if one is open.
    pub async fn close(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(mut conn) = conn {
            if let Err(e) = SinkExt::<&str>::close(&mut conn).await {
                debug!(error = %e, "error while closing device connection (ignored)");
            }
            debug!(endpoint = %self.endpoint, "device connection closed");
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    /// One request/reply round trip, with `parse` applied to the reply.
    ///
    /// The connection leaves the slot for the duration of the call and goes
    /// back only once the reply has been parsed. A call that fails, times out
    /// or is dropped mid-flight takes the connection with it, so a late reply
    /// can never be read as the answer to a later request.
    async fn exchange<T>(
        &self,
        method: Method,
        payload: Option<SetPayload>,
        parse: impl FnOnce(ReplyFrame) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.signer.sign(&SignedHeader {
            method: method.as_str(),
            request_id,
            device_id: &self.device_id,
            timestamp,
        })?;

        let line = RequestFrame {
            m: method,
            r: request_id,
            d: self.device_id.clone(),
            i: self.signer.identity().to_owned(),
            t: timestamp,
            s: signature,
            p: payload,
        }
        .encode()?;

        let mut slot = self.conn.lock().await;
        let conn = slot.take();
        let round_trip = self.round_trip(conn, &line);
        let outcome = match tokio::time::timeout(self.transport.timeout, round_trip).await {
            Ok(reply) => reply,
            Err(_) => Err(self.timeout_error()),
        };
        let parsed = outcome
            .and_then(|(conn, frame)| Ok((conn, parse(frame.expect(request_id, method)?)?)));
        let (conn, value) = match parsed {
            Ok(pair) => pair,
            Err(e) => {
                trace!(endpoint = %self.endpoint, "dropped device connection");
                return Err(e);
            }
        };

        if self.transport.keep_alive {
            *slot = Some(conn);
        }
        Ok(value)
    }

    async fn round_trip(
        &self,
        conn: Option<Connection>,
        line: &str,
    ) -> Result<(Connection, ReplyFrame), Error> {
        let mut conn = match conn {
            Some(conn) => conn,
            None => self.open().await?,
        };

        trace!(frame = line, "-> device");
        conn.send(line).await.map_err(|e| self.codec_error(e))?;

        match conn.next().await {
            Some(Ok(reply)) => {
                trace!(frame = %reply, "<- device");
                let frame = ReplyFrame::decode(&reply)?;
                Ok((conn, frame))
            }
            Some(Err(e)) => Err(self.codec_error(e)),
            None => Err(Error::Disconnected),
        }
    }

    async fn open(&self) -> Result<Connection, Error> {
        debug!(endpoint = %self.endpoint, "opening device connection");
        let stream = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .await
            .map_err(|source| Error::Connect {
                addr: self.endpoint.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        Ok(Framed::new(
            stream,
            LinesCodec::new_with_max_length(self.transport.max_frame_len),
        ))
    }

    fn codec_error(&self, err: LinesCodecError) -> Error {
        match err {
            LinesCodecError::MaxLineLengthExceeded => Error::FrameTooLong {
                limit: self.transport.max_frame_len,
            },
            LinesCodecError::Io(e) => Error::Io(e),
        }
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout: self.transport.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display_brackets_ipv6() {
        assert_eq!(Endpoint::new("192.168.1.40", 47819).to_string(), "192.168.1.40:47819");
        assert_eq!(Endpoint::new("fe80::1", 47819).to_string(), "[fe80::1]:47819");
    }
}
