use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, Weak};

use crate::h2::Role;
use crate::h2::error::Error;
use crate::h2::flow::{Allocate, DEFAULT_CONNECTION_WINDOW, MAX_WINDOW_SIZE, RecvWindow, SendWindow, WindowAllocator};
use crate::h2::queue::{Dispatch, WriteQueue};
use crate::h2::settings::Settings;
use crate::h2::signal::Signal;
use crate::h2::stream::Stream;
use crate::log::info;

/// Connection wide state shared by every stream.
///
/// Tracks active streams, the stream table, settings snapshots and the connection flow-control
/// windows. Streams register themselves at their first activation and remove themselves when
/// closed.
pub struct Connection {
    role: Role,
    local_settings: RwLock<Settings>,
    remote_settings: RwLock<Settings>,
    /// active locally initiated streams
    num_streams: AtomicU32,
    /// active remotely initiated streams
    remote_num_streams: AtomicU32,
    streams: Mutex<HashMap<u32, Arc<Stream>>>,
    /// handed out by `stream` but not registered yet
    idle: Mutex<HashMap<u32, Weak<Stream>>>,
    send_flow: SendWindow,
    recv_flow: RecvWindow,
    allocator: Arc<dyn Allocate>,
    dispatcher: Arc<dyn Dispatch>,
    closed: Signal,
}

/// [`Connection`] builder.
pub struct Builder {
    role: Role,
    local_settings: Settings,
    remote_settings: Settings,
    allocator: Option<Arc<dyn Allocate>>,
}

impl Builder {
    /// Settings advertised by this endpoint.
    pub fn local_settings(mut self, settings: Settings) -> Self {
        self.local_settings = settings;
        self
    }

    /// Settings acknowledged from the peer.
    pub fn remote_settings(mut self, settings: Settings) -> Self {
        self.remote_settings = settings;
        self
    }

    /// Flow-control allocator, defaults to [`WindowAllocator`].
    pub fn allocator(mut self, allocator: Arc<dyn Allocate>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn build(self, dispatcher: Arc<dyn Dispatch>) -> Arc<Connection> {
        Arc::new(Connection {
            role: self.role,
            local_settings: RwLock::new(self.local_settings),
            remote_settings: RwLock::new(self.remote_settings),
            num_streams: AtomicU32::new(0),
            remote_num_streams: AtomicU32::new(0),
            streams: Mutex::new(HashMap::new()),
            idle: Mutex::new(HashMap::new()),
            send_flow: SendWindow::new(DEFAULT_CONNECTION_WINDOW),
            recv_flow: RecvWindow::new(DEFAULT_CONNECTION_WINDOW),
            allocator: self.allocator.unwrap_or_else(|| Arc::new(WindowAllocator)),
            dispatcher,
            closed: Signal::new(),
        })
    }
}

impl Connection {
    /// Create connection with default settings, dispatching writes to a [`WriteQueue`].
    pub fn new(role: Role) -> (Arc<Self>, Arc<WriteQueue>) {
        let queue = Arc::new(WriteQueue::new());
        let conn = Self::builder(role).build(queue.clone());
        (conn, queue)
    }

    pub fn builder(role: Role) -> Builder {
        Builder {
            role,
            local_settings: Settings::new(),
            remote_settings: Settings::new(),
            allocator: None,
        }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn is_server(&self) -> bool {
        matches!(self.role, Role::Server)
    }

    // ===== Streams =====

    /// Returns the registered stream, or the idle stream for `id` which is registered at its
    /// first activation.
    ///
    /// Lookups of the same unregistered `id` return the same stream while it is alive.
    pub fn stream(self: &Arc<Self>, id: u32) -> Arc<Stream> {
        let streams = self.lock_streams();
        if let Some(stream) = streams.get(&id) {
            return Arc::clone(stream);
        }

        let mut idle = self.lock_idle();
        if let Some(stream) = idle.get(&id).and_then(Weak::upgrade) {
            return stream;
        }

        idle.retain(|_, stream| stream.strong_count() != 0);
        let stream = Arc::new(Stream::new(id, Arc::clone(self)));
        idle.insert(id, Arc::downgrade(&stream));
        stream
    }

    pub fn get_stream(&self, id: u32) -> Option<Arc<Stream>> {
        self.lock_streams().get(&id).cloned()
    }

    /// Number of registered streams.
    pub fn stream_count(&self) -> usize {
        self.lock_streams().len()
    }

    /// Number of active locally initiated streams.
    pub fn num_streams(&self) -> u32 {
        self.num_streams.load(Ordering::Acquire)
    }

    /// Number of active remotely initiated streams.
    pub fn remote_num_streams(&self) -> u32 {
        self.remote_num_streams.load(Ordering::Acquire)
    }

    fn lock_streams(&self) -> MutexGuard<'_, HashMap<u32, Arc<Stream>>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_idle(&self) -> MutexGuard<'_, HashMap<u32, Weak<Stream>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add_stream(&self, stream: Arc<Stream>) {
        let mut streams = self.lock_streams();
        let mut idle = self.lock_idle();
        if idle.get(&stream.id()).is_some_and(|s| std::ptr::eq(s.as_ptr(), &*stream)) {
            idle.remove(&stream.id());
        }
        streams.entry(stream.id()).or_insert(stream);
    }

    pub(crate) fn remove_stream(&self, stream: &Stream) {
        let mut streams = self.lock_streams();
        if streams.get(&stream.id()).is_some_and(|s| std::ptr::eq(&**s, stream)) {
            streams.remove(&stream.id());
        }
    }

    pub(crate) fn increment_active(&self, local: bool) {
        match local {
            true => self.num_streams.fetch_add(1, Ordering::AcqRel),
            false => self.remote_num_streams.fetch_add(1, Ordering::AcqRel),
        };
    }

    pub(crate) fn decrement_active(&self, local: bool) {
        match local {
            true => self.num_streams.fetch_sub(1, Ordering::AcqRel),
            false => self.remote_num_streams.fetch_sub(1, Ordering::AcqRel),
        };
    }

    // ===== Settings =====

    pub fn local_settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.local_settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn remote_settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.remote_settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn remote_max_frame_size(&self) -> usize {
        self.remote_settings().max_frame_size as usize
    }

    /// Replace local settings, affecting streams activated afterwards.
    pub fn set_local_settings(&self, settings: Settings) {
        *self.local_settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Apply the peer's new `SETTINGS_INITIAL_WINDOW_SIZE`.
    ///
    /// The difference is added to the send window of every registered stream, streams activated
    /// afterwards start with the new size. If any window would overflow, nothing is changed.
    pub fn set_remote_initial_window(&self, size: u32) -> Result<(), Error> {
        if size as i64 > MAX_WINDOW_SIZE {
            return Err(Error::FlowControl);
        }

        let mut settings = self.remote_settings.write().unwrap_or_else(PoisonError::into_inner);
        let delta = size as i64 - settings.initial_window_size as i64;

        let streams: Vec<_> = self.lock_streams().values().cloned().collect();
        let flows: Vec<_> = streams.iter().filter_map(|stream| stream.send_flow()).collect();

        for (applied, flow) in flows.iter().enumerate() {
            if let Err(err) = flow.increment_window(delta) {
                // shrinking back never overflows
                for flow in &flows[..applied] {
                    let _ = flow.increment_window(-delta);
                }
                return Err(err);
            }
        }

        settings.initial_window_size = size;
        Ok(())
    }

    // ===== Flow Control =====

    pub fn send_flow(&self) -> &SendWindow {
        &self.send_flow
    }

    pub fn recv_flow(&self) -> &RecvWindow {
        &self.recv_flow
    }

    /// Return processed octets to the connection window.
    ///
    /// Returns the connection WINDOW_UPDATE increment to announce, if any.
    pub fn return_bytes(&self, n: u32) -> Option<u32> {
        self.recv_flow.return_bytes(n)
    }

    pub(crate) fn allocator(&self) -> &dyn Allocate {
        &*self.allocator
    }

    pub(crate) fn dispatcher(&self) -> &dyn Dispatch {
        &*self.dispatcher
    }

    // ===== Closure =====

    pub fn is_closed(&self) -> bool {
        self.closed.is_fired()
    }

    /// Wait until the connection is closed.
    pub async fn closed(&self) {
        self.closed.wait().await
    }

    /// Close the connection, every registered stream is forced to closed.
    pub fn close(&self) {
        if !self.closed.fire() {
            return;
        }
        self.send_flow.cancel();

        let streams: Vec<_> = self.lock_streams().values().cloned().collect();
        info!("[CONNECTION] closing with {} streams", streams.len());
        for stream in streams {
            stream.force_close();
        }
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("role", &self.role)
            .field("local_settings", &self.local_settings)
            .field("remote_settings", &self.remote_settings)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("num_streams", &self.num_streams())
            .field("remote_num_streams", &self.remote_num_streams())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
