//! The delivery channel pair between a parse worker and its consumers.
//!
//! One lane carries messages, the other per-record errors. Each lane holds at most one value and
//! the worker reserves both before it parses the next record, so at most one record is ever in
//! flight and the consumer sees values in the order the worker produced them.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::ReaderError;
use crate::types::Message;

/// Create a connected pair of lane ends bound to a session's cancellation token.
pub(crate) fn lanes(session: CancellationToken) -> (LaneSender, LaneReceiver) {
    let (msg_tx, msg_rx) = mpsc::channel::<Message>(1);
    let (err_tx, err_rx) = mpsc::channel::<ReaderError>(1);
    (
        LaneSender {
            msg: msg_tx,
            err: err_tx,
            session: session.clone(),
        },
        LaneReceiver {
            rx: Arc::new(Mutex::new(Receivers {
                msg: msg_rx,
                err: err_rx,
            })),
            session,
        },
    )
}

/// Worker end. Dropping it closes both lanes.
pub(crate) struct LaneSender {
    msg: mpsc::Sender<Message>,
    err: mpsc::Sender<ReaderError>,
    session: CancellationToken,
}

impl LaneSender {
    /// Wait until both lanes are empty and reserve a slot on each.
    ///
    /// Returns `None` if the session was cancelled first or every consumer is gone.
    pub(crate) async fn ready(&self) -> Option<Permits<'_>> {
        tokio::select! {
            biased;

            () = self.session.cancelled() => None,
            permits = async { tokio::try_join!(self.msg.reserve(), self.err.reserve()) } => {
                permits.ok().map(|(msg, err)| Permits { msg, err })
            }
        }
    }
}

/// Reserved slots on both lanes; exactly one of them is used.
pub(crate) struct Permits<'a> {
    msg: mpsc::Permit<'a, Message>,
    err: mpsc::Permit<'a, ReaderError>,
}

impl Permits<'_> {
    /// Put `item` on its lane. Never blocks.
    pub(crate) fn send(self, item: Result<Message, ReaderError>) {
        match item {
            Ok(m) => self.msg.send(m),
            Err(e) => self.err.send(e),
        }
    }
}

/// What a consumer got from the lanes.
#[derive(Debug)]
pub(crate) enum Delivery {
    Message(Message),
    Error(ReaderError),
    /// The session ended with nothing pending.
    Closed,
    /// The caller's cancellation fired first.
    Cancelled,
}

struct Receivers {
    msg: mpsc::Receiver<Message>,
    err: mpsc::Receiver<ReaderError>,
}

/// Consumer end. Cheap to clone; concurrent readers take turns on the same lanes.
#[derive(Clone)]
pub(crate) struct LaneReceiver {
    rx: Arc<Mutex<Receivers>>,
    session: CancellationToken,
}

impl LaneReceiver {
    /// Wait for the next message or error, for the session to end, or for `cancel`.
    ///
    /// A value already waiting on a lane wins over both cancellations. Receiving is cancel-safe:
    /// a value is either returned or left on its lane.
    pub(crate) async fn recv(&self, cancel: &CancellationToken) -> Delivery {
        let mut guard = tokio::select! {
            biased;

            guard = self.rx.lock() => guard,
            () = self.session.cancelled() => return Delivery::Closed,
            () = cancel.cancelled() => return Delivery::Cancelled,
        };
        let Receivers { msg, err } = &mut *guard;

        tokio::select! {
            biased;

            m = msg.recv() => m.map_or(Delivery::Closed, Delivery::Message),
            e = err.recv() => e.map_or(Delivery::Closed, Delivery::Error),
            () = self.session.cancelled() => Delivery::Closed,
            () = cancel.cancelled() => Delivery::Cancelled,
        }
    }
}
