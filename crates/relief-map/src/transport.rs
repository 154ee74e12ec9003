use crossbeam::channel::{self, Receiver, Sender};

/// Moves encoded [`SyncMessage`](crate::SyncMessage)s between session participants.
///
/// For a host, `send` reaches every client. For a client, it reaches the host.
pub trait SessionTransport: Send + Sync {
    fn send(&self, bytes: Vec<u8>);

    /// The next message that has arrived, without blocking.
    fn try_recv(&self) -> Option<Vec<u8>>;
}

/// An in-process transport, one end of a connected pair.
pub struct LoopbackTransport {
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
}

impl LoopbackTransport {
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = channel::unbounded();
        let (b_tx, b_rx) = channel::unbounded();

        (
            Self {
                outbound: a_tx,
                inbound: b_rx,
            },
            Self {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }
}

impl SessionTransport for LoopbackTransport {
    fn send(&self, bytes: Vec<u8>) {
        if self.outbound.send(bytes).is_err() {
            log::debug!("Loopback peer hung up");
        }
    }

    fn try_recv(&self) -> Option<Vec<u8>> {
        self.inbound.try_recv().ok()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
