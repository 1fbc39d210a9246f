// Stream transport: one fresh connection per logical message. The sender
// writes the envelope and closes; the listener reads to end-of-stream and
// hands the envelope up. The handler is held as a weak back reference so
// node and transport can point at each other without an ownership cycle.

use crate::error::{NodeError, Result};
use crate::network::message::{Command, EmptyPayload, Message};
use log::{debug, error, info, warn};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;
const TCP_READ_TIMEOUT: u64 = 5000;

/// Receives every decoded envelope together with the sender's listening
/// endpoint, reconstructed from the connection's remote host and the
/// envelope's `from_port`.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: Message, sender: SocketAddr);
}

pub struct TcpTransport {
    listen_port: u16,
    handler: RwLock<Weak<dyn MessageHandler>>,
    shutdown: Arc<AtomicBool>,
    listener_thread: Mutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    pub fn new(listen_port: u16) -> TcpTransport {
        TcpTransport {
            listen_port,
            handler: RwLock::new(Weak::<Noop>::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            listener_thread: Mutex::new(None),
        }
    }

    pub fn get_listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Inject the upper layer. A weak reference only; the transport never
    /// owns its handler.
    pub fn set_handler(&self, handler: Weak<dyn MessageHandler>) {
        let mut slot = self
            .handler
            .write()
            .expect("Failed to acquire write lock on handler - this should never happen");
        *slot = handler;
    }

    /// Bind the listening socket and start accepting. One thread per
    /// accepted connection, one envelope per connection.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.listen_port);
        let listener = TcpListener::bind(&addr)
            .map_err(|e| NodeError::Network(format!("Failed to bind to {addr}: {e}")))?;

        info!("Listening on {addr}");

        let transport = Arc::clone(self);
        let thread = thread::spawn(move || {
            for stream in listener.incoming() {
                if transport.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                match stream {
                    Ok(stream) => {
                        let transport = Arc::clone(&transport);
                        thread::spawn(move || {
                            if let Err(e) = transport.handle_connection(stream) {
                                debug!("Dropped connection: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {e}");
                    }
                }
            }
        });

        let mut slot = self
            .listener_thread
            .lock()
            .expect("Failed to acquire lock on listener thread - this should never happen");
        *slot = Some(thread);
        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))
            .map_err(|e| NodeError::Network(format!("Failed to set read timeout: {e}")))?;

        let remote = stream
            .peer_addr()
            .map_err(|e| NodeError::Network(format!("Failed to get peer address: {e}")))?;

        let mut stream = stream;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|e| NodeError::Network(format!("Failed to read envelope: {e}")))?;
        let _ = stream.shutdown(Shutdown::Both);

        // Malformed envelopes are logged and dropped; the peer set routes
        // around a bad message.
        let message = match Message::decode(bytes.as_slice()) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding malformed envelope from {remote}: {e}");
                return Ok(());
            }
        };

        if message.from_port > u16::MAX as u32 {
            warn!("Discarding envelope with invalid from_port from {remote}");
            return Ok(());
        }
        let sender = SocketAddr::new(remote.ip(), message.from_port as u16);

        // Liveness answers live here so PONG never waits on the upper
        // layer; the handler still sees the PING to record the sighting.
        if message.command == Command::Ping {
            match Message::new(Command::Pong, &EmptyPayload {}, self.listen_port) {
                Ok(pong) => self.send(sender, pong),
                Err(e) => error!("Failed to encode PONG: {e}"),
            }
        }

        let handler = {
            let slot = self
                .handler
                .read()
                .expect("Failed to acquire read lock on handler - this should never happen");
            slot.upgrade()
        };
        if let Some(handler) = handler {
            handler.handle_message(message, sender);
        }
        Ok(())
    }

    /// Fire-and-forget send on a worker thread so callers never block on a
    /// slow peer. Failures are logged and swallowed.
    pub fn send(&self, to: SocketAddr, message: Message) {
        thread::spawn(move || {
            if let Err(e) = send_once(to, &message) {
                warn!("Failed to send {:?} to {to}: {e}", message.command);
            }
        });
    }

    /// Stop accepting. A wake-up connection unblocks the accept loop;
    /// in-flight outbound sends may still complete.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect_timeout(
            &SocketAddr::from(([127, 0, 0, 1], self.listen_port)),
            Duration::from_millis(TCP_WRITE_TIMEOUT),
        );

        let thread = {
            let mut slot = self
                .listener_thread
                .lock()
                .expect("Failed to acquire lock on listener thread - this should never happen");
            slot.take()
        };
        if let Some(thread) = thread {
            let _ = thread.join();
        }
        info!("Listener on port {} stopped", self.listen_port);
    }
}

/// Synchronous single-shot send: fresh connection, write, end-of-stream.
pub fn send_once(to: SocketAddr, message: &Message) -> Result<()> {
    let bytes = message.encode()?;

    let mut stream = TcpStream::connect_timeout(&to, Duration::from_millis(TCP_WRITE_TIMEOUT))
        .map_err(|e| NodeError::Network(format!("Failed to connect to {to}: {e}")))?;
    stream
        .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
        .map_err(|e| NodeError::Network(format!("Failed to set write timeout: {e}")))?;

    stream
        .write_all(bytes.as_slice())
        .map_err(|e| NodeError::Network(format!("Failed to send envelope: {e}")))?;
    let _ = stream.flush();
    let _ = stream.shutdown(Shutdown::Write);
    Ok(())
}

// Placeholder target for the initial empty weak reference.
struct Noop;

impl MessageHandler for Noop {
    fn handle_message(&self, _message: Message, _sender: SocketAddr) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct Recorder {
        sink: Mutex<mpsc::Sender<(Message, SocketAddr)>>,
    }

    impl MessageHandler for Recorder {
        fn handle_message(&self, message: Message, sender: SocketAddr) {
            let sink = self.sink.lock().unwrap();
            let _ = sink.send((message, sender));
        }
    }

    #[test]
    fn test_one_envelope_per_connection() {
        let transport = Arc::new(TcpTransport::new(39411));
        let (tx, rx) = mpsc::channel();
        let recorder: Arc<dyn MessageHandler> = Arc::new(Recorder {
            sink: Mutex::new(tx),
        });
        transport.set_handler(Arc::downgrade(&recorder));
        transport.start().unwrap();

        let message = Message::new(Command::GetTransactions, &EmptyPayload {}, 39412).unwrap();
        transport.send(SocketAddr::from(([127, 0, 0, 1], 39411)), message);

        let (received, sender) = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(received.command, Command::GetTransactions);
        assert_eq!(sender.port(), 39412);

        transport.stop();
    }

    #[test]
    fn test_malformed_envelope_is_dropped() {
        let transport = Arc::new(TcpTransport::new(39413));
        let (tx, rx) = mpsc::channel();
        let recorder: Arc<dyn MessageHandler> = Arc::new(Recorder {
            sink: Mutex::new(tx),
        });
        transport.set_handler(Arc::downgrade(&recorder));
        transport.start().unwrap();

        let mut stream = TcpStream::connect("127.0.0.1:39413").unwrap();
        stream.write_all(b"this is not json").unwrap();
        drop(stream);

        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
        transport.stop();
    }
}
