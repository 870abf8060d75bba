use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use tracing::{debug, info, warn};

/// Listener for a `may_minihttp` service, accepting up to 32 request headers.
pub struct HttpServer<T>(pub T);

/// Handle to a running listener.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening address until a connection succeeds.
    ///
    /// # Errors
    ///
    /// `TimedOut` when nothing accepts within about 250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for attempt in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                debug!(addr = %self.addr, attempt, "Listener ready");
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the listener coroutine and wait for it.
    pub fn stop(self) {
        // SAFETY: the handle is owned here and the coroutine is not used after cancel.
        #[allow(unsafe_code)]
        unsafe {
            self.handle.coroutine().cancel();
        }
        match self.handle.join() {
            Ok(()) => info!(addr = %self.addr, "Server stopped"),
            Err(_) => warn!(addr = %self.addr, "Listener panicked while stopping"),
        }
    }

    /// Block until the listener exits.
    ///
    /// # Errors
    ///
    /// The panic payload when the listener coroutine panicked.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start accepting.
    ///
    /// # Errors
    ///
    /// When the address does not resolve or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServerWithHeaders::<_, 32>(self.0).start(addr)?;
        Ok(ServerHandle { addr, handle })
    }
}
