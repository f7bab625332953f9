//! RPC client: typed calls over one-shot HTTP/2 connections.
//!
//! Each call encodes its request up front, then spawns a worker thread
//! that owns the connection for the call's whole lifetime. The caller
//! blocks on a one-shot channel with the call deadline; on timeout the
//! worker is abandoned and self-terminates once its own loop errors or
//! hits the hard deadline. Results are always returned as data; a
//! failed call never panics the calling context.
//!
//! Calls are serialized by a mutex owned by the client, so at most one
//! request is in flight per client instance.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{info, warn};

use super::frame;
use super::h2;
use super::messages::{
    EmptyRequest, GetRequest, Location, Shelf, Shortcut, StartCommandRequest,
    StartCommandResponse, decode_locations, decode_shelves, decode_shortcuts,
    decode_start_command, decode_version,
};
use super::proto::ProtoWriter;
use super::resolver::{DnsLookup, Resolver};
use super::transport;

/// gRPC service namespace on the robot.
const API_NAMESPACE: &str = "robot_api.RobotApi";

/// Upper bound on an encoded request, frame header included.
const SEND_BUFFER_SIZE: usize = 2048;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one call, returned as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    EncodeFailed,
    NotConnected,
    Timeout,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::EncodeFailed => "Encode failed",
            Self::NotConnected => "Not connected",
            Self::Timeout => "Timeout",
        }
    }
}

/// The typed call surface, split out as a trait so the dispatch and
/// state-fetch layers can be exercised against a mock peer.
pub trait RobotApiPort {
    fn get_robot_version(&self) -> (ResultCode, String);
    fn get_shelves(&self) -> (ResultCode, Vec<Shelf>);
    fn get_locations(&self) -> (ResultCode, Vec<Location>);
    fn get_shortcuts(&self) -> (ResultCode, Vec<Shortcut>);
    fn start_command(&self, request: &StartCommandRequest)
    -> (ResultCode, StartCommandResponse);
    fn proceed(&self) -> ResultCode;
    fn cancel_command(&self) -> ResultCode;
}

enum WorkerResult<T> {
    NotConnected,
    Done(Option<T>),
}

pub struct RpcClient {
    target: Mutex<(String, u16)>,
    resolver: Arc<Resolver<DnsLookup>>,
    /// Serializes calls; held for the full duration of each call.
    call_lock: Mutex<()>,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(host: String, port: u16) -> Self {
        Self::with_timeout(host, port, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(host: String, port: u16, timeout: Duration) -> Self {
        Self {
            target: Mutex::new((host, port)),
            resolver: Arc::new(Resolver::new()),
            call_lock: Mutex::new(()),
            timeout,
        }
    }

    /// Re-point the client at a different robot (pairing flow).
    pub fn set_robot_host(&self, host: String, port: u16) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = (host, port);
    }

    fn target(&self) -> (String, u16) {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Encode, send on a worker thread, wait with the call deadline.
    fn call<T: Send + 'static>(
        &self,
        method: &'static str,
        encode: impl FnOnce(&mut ProtoWriter),
        decode: impl Fn(&[u8]) -> Option<T> + Send + 'static,
    ) -> (ResultCode, Option<T>) {
        let _in_flight = self.call_lock.lock().unwrap_or_else(PoisonError::into_inner);

        info!("rpc: --> {method}");

        let mut writer = ProtoWriter::new(SEND_BUFFER_SIZE - frame::HEADER_SIZE);
        encode(&mut writer);
        let Some(payload) = writer.into_bytes() else {
            warn!("rpc: {method} request does not fit the send buffer");
            return (ResultCode::EncodeFailed, None);
        };
        let mut body = vec![0u8; frame::HEADER_SIZE + payload.len()];
        let Some(body_len) = frame::encode_frame(&payload, &mut body) else {
            return (ResultCode::EncodeFailed, None);
        };
        body.truncate(body_len);

        let (host, port) = self.target();
        let resolver = Arc::clone(&self.resolver);
        let path = format!("/{API_NAMESPACE}/{method}");
        // Hard bound for the abandoned-worker case.
        let worker_deadline = Instant::now() + self.timeout * 2;

        let (tx, rx) = mpsc::sync_channel::<WorkerResult<T>>(1);
        std::thread::spawn(move || {
            let result = run_worker(&resolver, &host, port, &path, &body, worker_deadline)
                .map(|response| extract_message(&response.data).and_then(|m| decode(&m)));
            let outcome = match result {
                Ok(value) => WorkerResult::Done(value),
                Err(WorkerError::NotConnected) => WorkerResult::NotConnected,
                // Post-connect failures still resolve the call; the
                // completion signal, not payload delivery, decides it.
                Err(WorkerError::Aborted) => WorkerResult::Done(None),
            };
            // The caller may have timed out and dropped the receiver.
            let _ = tx.send(outcome);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(WorkerResult::Done(value)) => (ResultCode::Ok, value),
            Ok(WorkerResult::NotConnected) => {
                warn!("rpc: {method}: not connected");
                (ResultCode::NotConnected, None)
            }
            Err(_) => {
                warn!("rpc: {method}: timeout");
                (ResultCode::Timeout, None)
            }
        }
    }
}

enum WorkerError {
    NotConnected,
    Aborted,
}

fn run_worker(
    resolver: &Resolver<DnsLookup>,
    host: &str,
    port: u16,
    path: &str,
    body: &[u8],
    deadline: Instant,
) -> Result<h2::ResponseBody, WorkerError> {
    let address = resolver.resolve(host);
    let mut conn = transport::connect(&address, port).map_err(|e| {
        warn!("rpc: connect to {address}:{port} failed: {e}");
        WorkerError::NotConnected
    })?;
    let authority = format!("{address}:{port}");
    match h2::post(&mut conn, &authority, path, body, deadline) {
        Ok(response) => Ok(response),
        // A reset stream completes the call with an empty response.
        Err(h2::H2Error::StreamReset) => Ok(h2::ResponseBody { data: Vec::new() }),
        Err(e) => {
            warn!("rpc: request loop ended: {e:?}");
            Err(WorkerError::Aborted)
        }
    }
}

/// Strip the response's own gRPC frame header. An empty body (trailers
/// only) yields an empty message.
fn extract_message(data: &[u8]) -> Option<Vec<u8>> {
    if data.is_empty() {
        return Some(Vec::new());
    }
    let mut decoder = frame::FrameDecoder::new();
    // The body is complete at this point; a partial frame means the peer
    // lied about lengths and the payload is dropped.
    match decoder.feed(data) {
        Some(payload) => Some(payload.to_vec()),
        None => {
            warn!("rpc: response framing incomplete ({} bytes)", data.len());
            None
        }
    }
}

impl RobotApiPort for RpcClient {
    fn get_robot_version(&self) -> (ResultCode, String) {
        let (code, version) =
            self.call("GetRobotVersion", |w| GetRequest::default().encode(w), |m| {
                decode_version(m)
            });
        (code, version.unwrap_or_default())
    }

    fn get_shelves(&self) -> (ResultCode, Vec<Shelf>) {
        let (code, shelves) =
            self.call("GetShelves", |w| GetRequest::default().encode(w), decode_shelves);
        (code, shelves.unwrap_or_default())
    }

    fn get_locations(&self) -> (ResultCode, Vec<Location>) {
        let (code, locations) = self.call(
            "GetLocations",
            |w| GetRequest::default().encode(w),
            decode_locations,
        );
        (code, locations.unwrap_or_default())
    }

    fn get_shortcuts(&self) -> (ResultCode, Vec<Shortcut>) {
        let (code, shortcuts) = self.call(
            "GetShortcuts",
            |w| GetRequest::default().encode(w),
            decode_shortcuts,
        );
        (code, shortcuts.unwrap_or_default())
    }

    fn start_command(
        &self,
        request: &StartCommandRequest,
    ) -> (ResultCode, StartCommandResponse) {
        let request = request.clone();
        let (code, response) =
            self.call("StartCommand", move |w| request.encode(w), decode_start_command);
        (code, response.unwrap_or_default())
    }

    fn proceed(&self) -> ResultCode {
        self.call("Proceed", |w| EmptyRequest.encode(w), decode_start_command)
            .0
    }

    fn cancel_command(&self) -> ResultCode {
        self.call("CancelCommand", |w| EmptyRequest.encode(w), decode_start_command)
            .0
    }
}
