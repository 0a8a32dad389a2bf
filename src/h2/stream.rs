use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::io;
use tokio::sync::oneshot;

use crate::h2::conn::Connection;
use crate::h2::error::{ConnectionError, Error, ErrorCode, StreamError};
use crate::h2::flow::{RecvWindow, SendWindow};
use crate::h2::frame::{Data, Frame, FrameWrite, Priority, Reset, Type};
use crate::h2::signal::Signal;
use crate::h2::state::StreamState;
use crate::log::{debug, warning};

const DEFAULT_WEIGHT: u8 = 16;
const NONE_WRITTEN: u8 = u8::MAX;

type Completion = oneshot::Sender<Result<(), Error>>;

/// A single HTTP/2 stream.
///
/// The state only changes through compare and swap, the side effects of a transition are run
/// by the caller whose swap succeeded.
pub struct Stream {
    id: u32,
    conn: Arc<Connection>,
    state: AtomicU8,

    // not enforced, see `Stream::set_priority`
    priority: Mutex<PriorityNode>,

    recv_flow: OnceLock<RecvWindow>,
    send_flow: OnceLock<SendWindow>,

    pending: Mutex<Option<Frame>>,
    last_written: AtomicU8,
    saw_eos: AtomicBool,

    reset_sent: AtomicBool,
    reset_received: AtomicBool,
    /// RST_STREAM waiting for the dispatcher, bypasses `wio`
    pending_reset: Mutex<Option<(Reset, Completion)>>,
    resetting: Signal,

    /// `true` while counted as active, registration and close out run under this lock
    activated: Mutex<bool>,

    /// at most one write in flight
    wio: tokio::sync::Mutex<()>,
    /// completion of the write in flight, if any
    werr: Mutex<Option<Completion>>,
    closed: Signal,
}

/// Position of a stream in the priority tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorityNode {
    pub weight: u8,
    pub parent: Option<u32>,
    pub children: Vec<u32>,
}

impl Stream {
    pub(crate) fn new(id: u32, conn: Arc<Connection>) -> Self {
        Self {
            id,
            conn,
            state: AtomicU8::new(StreamState::Idle as u8),
            priority: Mutex::new(PriorityNode { weight: DEFAULT_WEIGHT, parent: None, children: Vec::new() }),
            recv_flow: OnceLock::new(),
            send_flow: OnceLock::new(),
            pending: Mutex::new(None),
            last_written: AtomicU8::new(NONE_WRITTEN),
            saw_eos: AtomicBool::new(false),
            reset_sent: AtomicBool::new(false),
            reset_received: AtomicBool::new(false),
            pending_reset: Mutex::new(None),
            resetting: Signal::new(),
            activated: Mutex::new(false),
            wio: tokio::sync::Mutex::new(()),
            werr: Mutex::new(None),
            closed: Signal::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn active(&self) -> bool {
        self.state().is_active()
    }

    pub fn readable(&self) -> bool {
        self.state().is_readable()
    }

    pub fn writable(&self) -> bool {
        self.state().is_writable()
    }

    /// Returns `true` if the stream is initiated by this endpoint.
    ///
    /// Client initiated streams use odd identifiers, server initiated use even.
    pub fn is_local(&self) -> bool {
        self.conn.is_server() == (self.id & 1 == 0)
    }

    pub fn reset_sent(&self) -> bool {
        self.reset_sent.load(Ordering::Acquire)
    }

    pub fn reset_received(&self) -> bool {
        self.reset_received.load(Ordering::Acquire)
    }

    /// Type of the last frame written to the connection.
    pub fn last_written(&self) -> Option<Type> {
        Type::from_u8(self.last_written.load(Ordering::Acquire))
    }

    /// Returns `true` if a frame with END_STREAM has been written.
    pub fn is_end_stream_sent(&self) -> bool {
        self.saw_eos.load(Ordering::Acquire)
    }

    pub fn recv_flow(&self) -> Option<&RecvWindow> {
        self.recv_flow.get()
    }

    pub fn send_flow(&self) -> Option<&SendWindow> {
        self.send_flow.get()
    }

    pub fn priority(&self) -> PriorityNode {
        self.priority.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Priority signals are accepted and ignored, the dependency tree is not maintained.
    pub fn set_priority(&self, _priority: Priority) -> Result<(), Error> {
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_fired()
    }

    /// Wait until the stream is closed.
    pub async fn closed(&self) {
        self.closed.wait().await
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<Frame>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_werr(&self) -> MutexGuard<'_, Option<Completion>> {
        self.werr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_reset(&self) -> MutexGuard<'_, Option<(Reset, Completion)>> {
        self.pending_reset.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_activated(&self) -> MutexGuard<'_, bool> {
        self.activated.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ===== Transition =====

impl Stream {
    /// Apply a frame received from the peer.
    pub fn recv(self: &Arc<Self>, ty: Type, end_stream: bool) -> Result<StreamState, Error> {
        self.transition(true, ty, end_stream)
    }

    /// Apply a received DATA frame of `len` flow-controlled octets.
    pub fn recv_data(self: &Arc<Self>, len: u32, end_stream: bool) -> Result<StreamState, Error> {
        if let Some(flow) = self.recv_flow.get() {
            flow.consume(len)?;
        }
        self.conn.recv_flow().consume(len)?;
        self.transition(true, Type::Data, end_stream)
    }

    /// Return octets processed by the application.
    pub fn release(&self, n: u32) -> WindowIncrement {
        WindowIncrement {
            stream: self.recv_flow.get().and_then(|flow| flow.return_bytes(n)),
            connection: self.conn.return_bytes(n),
        }
    }

    /// Drive the state machine for a frame sent or received (`recv`).
    ///
    /// Concurrent callers are safe, only the caller whose swap lands runs its side effects.
    pub fn transition(self: &Arc<Self>, recv: bool, ty: Type, end_stream: bool) -> Result<StreamState, Error> {
        loop {
            let from = self.state();
            let Some(to) = from.transition(recv, ty, end_stream) else {
                let err = self.illegal(from, recv, ty);
                warning!("[STREAM {}] illegal {ty} in {from}: {err}", self.id);
                return Err(err);
            };

            let reset = (to == StreamState::Closed && ty == Type::RstStream).then_some(recv);
            if self.compare_and_swap_state(from, to, reset) {
                return Ok(to);
            }
        }
    }

    fn illegal(&self, from: StreamState, recv: bool, ty: Type) -> Error {
        if !recv {
            // An endpoint MUST NOT send frames other than PRIORITY on a closed stream.
            if from == StreamState::Closed {
                return Error::AlreadyClosed(self.id);
            }
            return Error::BadState(from);
        }

        // An endpoint that receives any frame other than PRIORITY after receiving a RST_STREAM
        // MUST treat that as a stream error of type STREAM_CLOSED.
        //
        // Frames received after sending RST_STREAM are not ignored for a grace period.
        if self.reset_received() || self.reset_sent() {
            return StreamError::Closed(self.id).into();
        }

        match (from, ty) {
            // An endpoint that receives any frames after receiving a frame with the END_STREAM
            // flag set MUST treat that as a connection error of type STREAM_CLOSED.
            (StreamState::HalfClosedRemote, _) => ConnectionError::StreamClosed(self.id).into(),
            (StreamState::Closed, Type::RstStream | Type::WindowUpdate) => {
                ConnectionError::ClosedStream(self.id).into()
            }
            _ => ConnectionError::BadState(self.id, from).into(),
        }
    }

    fn compare_and_swap_state(self: &Arc<Self>, from: StreamState, to: StreamState, reset: Option<bool>) -> bool {
        if self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        match reset {
            Some(true) => self.reset_received.store(true, Ordering::Release),
            Some(false) => self.reset_sent.store(true, Ordering::Release),
            None => {}
        }

        if from != to {
            debug!("[STREAM {}] {from} -> {to}", self.id);
        }

        use StreamState as S;
        match to {
            S::ReservedLocal | S::ReservedRemote => {
                if from == S::Idle {
                    self.register();
                }
            }
            S::Open | S::HalfClosedLocal | S::HalfClosedRemote => match from {
                S::Idle | S::ReservedLocal | S::ReservedRemote => self.activate(from, to),
                S::Open if to == S::HalfClosedLocal => self.end_local(),
                _ => {}
            },
            S::Closed => {
                if from != S::Closed {
                    self.close_out();
                }
            }
            S::Idle => {}
        }
        true
    }

    // Side effects below run after the swap is visible, so a later transition may land before
    // they take `activated`. Each one reads the state again under the lock.

    fn register(self: &Arc<Self>) {
        let _activated = self.lock_activated();
        if self.state() != StreamState::Closed {
            self.conn.add_stream(Arc::clone(self));
        }
    }

    fn activate(self: &Arc<Self>, from: StreamState, to: StreamState) {
        let mut activated = self.lock_activated();
        let now = self.state();
        if now == StreamState::Closed {
            // already closed out, nothing to count or register
            return;
        }

        *activated = true;
        self.conn.increment_active(self.is_local());

        {
            // settings stay locked until the stream is registered, so a concurrent initial
            // window change either precedes the snapshot or sees the stream
            let local = self.conn.local_settings();
            let remote = self.conn.remote_settings();

            let _ = self.recv_flow.set(RecvWindow::new(local.initial_window_size));
            if to != StreamState::HalfClosedLocal {
                let _ = self.send_flow.set(SendWindow::new(remote.initial_window_size));
            }

            if from == StreamState::Idle {
                self.conn.add_stream(Arc::clone(self));
            }
        }

        if now == StreamState::HalfClosedLocal {
            self.cancel_send_flow();
        }
    }

    fn end_local(&self) {
        let _activated = self.lock_activated();
        self.cancel(Error::StreamClosed);
        self.cancel_send_flow();
    }

    fn cancel_send_flow(&self) {
        if let Some(flow) = self.send_flow.get() {
            flow.cancel();
            flow.drain();
        }
    }

    fn close_out(&self) {
        let mut activated = self.lock_activated();
        if std::mem::take(&mut *activated) {
            self.conn.decrement_active(self.is_local());
        }

        self.closed.fire();
        self.cancel(Error::StreamClosed);
        if let Some((_, tx)) = self.lock_reset().take() {
            let _ = tx.send(Err(Error::StreamClosed));
        }

        self.cancel_send_flow();
        if let Some(flow) = self.recv_flow.get() {
            let consumed = flow.consumed();
            flow.return_bytes(consumed);
            self.conn.return_bytes(consumed);
        }

        self.conn.remove_stream(self);
    }

    /// Close the stream regardless of current state.
    pub fn force_close(self: &Arc<Self>) {
        loop {
            let from = self.state();
            if self.compare_and_swap_state(from, StreamState::Closed, None) {
                return;
            }
        }
    }
}

// ===== Write =====

impl Stream {
    /// Write HEADERS or DATA frame.
    ///
    /// DATA is split into multiple frames when flow control grants less than its length. Returns
    /// once every frame is written, or on the first error.
    pub async fn write(self: &Arc<Self>, frame: Frame) -> Result<(), Error> {
        let _guard = self.acquire().await?;

        if self.is_end_stream_sent() || self.resetting.is_fired() {
            return Err(Error::StreamClosed);
        }

        let from = self.state();
        let ty = frame.frame_type();
        if from.transition(false, ty, false).is_none() {
            return Err(self.illegal(from, false, ty));
        }

        let data = match frame {
            Frame::Data(data) => data,
            Frame::Headers(_) => {
                // opening HEADERS moves the stream out of idle or reserved before it is written,
                // END_STREAM is applied once written
                if matches!(from, StreamState::Idle | StreamState::ReservedLocal) {
                    self.transition(false, Type::Headers, false)?;
                }
                return self.submit(frame, false).await;
            }
            frame => return Err(Error::BadFlowControlFrame(frame.frame_type())),
        };

        let mut data_len = data.data_len();
        let mut pad_len = data.pad_len as usize;

        let mut allowed = self.allocate(data_len + pad_len).await?;
        if allowed == data_len + pad_len {
            return self.submit(Frame::Data(data), false).await;
        }

        let Data { mut payload, end_stream, .. } = data;

        loop {
            if allowed != 0 {
                let chunk_len = data_len.min(allowed);
                let padding = (allowed - chunk_len).min(pad_len);

                data_len -= chunk_len;
                pad_len -= padding;
                let last = data_len + pad_len == 0;

                let chunk = Data {
                    payload: payload.split_to(chunk_len),
                    pad_len: padding as u8,
                    end_stream: end_stream && last,
                };

                let result = self.submit(Frame::Data(chunk), false).await;
                if last || result.is_err() {
                    return result;
                }
            }

            allowed = self.allocate(data_len + pad_len).await?;
        }
    }

    /// Write RST_STREAM ahead of queued frames.
    ///
    /// Does not wait for a write in flight, a writer waiting for flow control fails with
    /// [`Error::StreamClosed`]. The stream is closed once the frame is written.
    pub async fn reset(self: &Arc<Self>, code: ErrorCode) -> Result<(), Error> {
        if self.conn.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if self.is_closed() {
            return Err(Error::StreamClosed);
        }

        let from = self.state();
        if from.transition(false, Type::RstStream, false).is_none() {
            return Err(self.illegal(from, false, Type::RstStream));
        }

        let (tx, mut rx) = oneshot::channel();
        {
            let mut pending = self.lock_reset();
            if pending.is_some() || !self.resetting.fire() {
                return Err(Error::StreamClosed);
            }
            *pending = Some((Reset { code }, tx));
        }

        self.conn.dispatcher().enqueue(Arc::clone(self), true);

        let result = tokio::select! {
            biased;
            result = &mut rx => return result.unwrap_or(Err(Error::StreamClosed)),
            _ = self.conn.closed() => Err(Error::ConnectionClosed),
            _ = self.closed.wait() => Err(Error::StreamClosed),
        };

        self.lock_reset().take();
        result
    }

    async fn acquire(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, Error> {
        tokio::select! {
            biased;
            _ = self.conn.closed() => Err(Error::ConnectionClosed),
            _ = self.closed.wait() => Err(Error::StreamClosed),
            guard = self.wio.lock() => Ok(guard),
        }
    }

    async fn allocate(&self, wanted: usize) -> Result<usize, Error> {
        tokio::select! {
            biased;
            _ = self.conn.closed() => Err(Error::ConnectionClosed),
            _ = self.closed.wait() => Err(Error::StreamClosed),
            _ = self.resetting.wait() => Err(Error::StreamClosed),
            result = self.conn.allocator().allocate(self, wanted) => result,
        }
    }

    /// Hand `frame` to the dispatcher and wait for it to be written.
    async fn submit(self: &Arc<Self>, frame: Frame, urgent: bool) -> Result<(), Error> {
        let (tx, mut rx) = oneshot::channel();
        *self.lock_pending() = Some(frame);
        *self.lock_werr() = Some(tx);

        self.conn.dispatcher().enqueue(Arc::clone(self), urgent);

        let result = tokio::select! {
            biased;
            result = &mut rx => return result.unwrap_or(Err(Error::StreamClosed)),
            _ = self.conn.closed() => Err(Error::ConnectionClosed),
            _ = self.closed.wait() => Err(Error::StreamClosed),
        };

        // abandoned, the dispatcher skips the unit
        self.lock_werr().take();
        self.lock_pending().take();
        result
    }

    /// Write the pending frame, called by the dispatcher once per enqueued unit.
    ///
    /// A pending RST_STREAM is written first. The outcome is delivered to the waiting writer, and
    /// a successfully written END_STREAM or RST_STREAM drives the local state transition.
    pub fn transmit<W: FrameWrite + ?Sized>(self: &Arc<Self>, writer: &mut W) -> Result<(), Error> {
        let reset = self.lock_reset().take();
        let (frame, tx) = match reset {
            Some((reset, tx)) => (Frame::Reset(reset), tx),
            None => {
                let Some(frame) = self.lock_pending().take() else {
                    return Ok(());
                };
                let Some(tx) = self.lock_werr().take() else {
                    debug!("[STREAM {}] writer cancelled, dropping {}", self.id, frame.frame_type());
                    return Ok(());
                };
                (frame, tx)
            }
        };

        let result = writer.write_frame(self.id, &frame);
        let ty = frame.frame_type();
        let end_stream = frame.is_end_stream();

        self.last_written.store(ty as u8, Ordering::Release);
        if end_stream {
            self.saw_eos.store(true, Ordering::Release);
        }

        let flushed = match result {
            Ok(()) => {
                let _ = tx.send(Ok(()));
                Ok(())
            }
            Err(err) => {
                // the dispatcher keeps the original error
                let _ = tx.send(Err(Error::Io(io::Error::new(err.kind(), err.to_string()))));
                Err(Error::Io(err))
            }
        };
        flushed?;

        if end_stream {
            self.transition(false, ty, true)?;
        } else if ty == Type::RstStream {
            self.transition(false, ty, false)?;
        }
        Ok(())
    }

    /// Deliver `err` to the writer waiting for completion, if any.
    pub fn cancel(&self, err: Error) {
        if let Some(tx) = self.lock_werr().take() {
            debug!("[STREAM {}] cancel writer: {err}", self.id);
            let _ = tx.send(Err(err));
        }
    }
}

/// WINDOW_UPDATE increments to announce after returning processed octets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowIncrement {
    pub stream: Option<u32>,
    pub connection: Option<u32>,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("reset_sent", &self.reset_sent())
            .field("reset_received", &self.reset_received())
            .finish_non_exhaustive()
    }
}
