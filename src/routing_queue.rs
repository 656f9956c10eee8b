use crossbeam_channel::{Receiver, Sender};

use crate::error::PartitionError;

/// A line without its terminator.
pub type Line = Vec<u8>;

/// FIFO of lines between the producers and the bucket writers.
///
/// Producers enqueue through [LineSender] handles, consumers dequeue through [LineReceiver]
/// handles. After [RoutingQueue::close] no new producer handles can be created, and once the
/// last producer handle is dropped consumers see the remaining lines followed by `None`.
///
/// # Examples
/// ```
/// use text_file_partition::routing_queue::RoutingQueue;
///
/// let mut queue = RoutingQueue::bounded(8);
/// let producer = queue.producer().unwrap();
/// let consumer = queue.consumer();
/// producer.enqueue(b"apple".to_vec()).unwrap();
/// drop(producer);
/// queue.close();
/// assert_eq!(consumer.dequeue(), Some(b"apple".to_vec()));
/// assert_eq!(consumer.dequeue(), None);
/// ```
pub struct RoutingQueue {
    sender: Option<Sender<Line>>,
    receiver: Receiver<Line>,
}

impl RoutingQueue {
    /// A queue holding at most `capacity` pending lines; producers block while it is full.
    pub fn bounded(capacity: usize) -> RoutingQueue {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        RoutingQueue {
            sender: Some(sender),
            receiver,
        }
    }

    pub fn unbounded() -> RoutingQueue {
        let (sender, receiver) = crossbeam_channel::unbounded();
        RoutingQueue {
            sender: Some(sender),
            receiver,
        }
    }

    /// Create a producer handle. Fails with [PartitionError::QueueClosed] after close.
    pub fn producer(&self) -> Result<LineSender, PartitionError> {
        self.sender
            .as_ref()
            .map(|sender| LineSender { sender: sender.clone() })
            .ok_or(PartitionError::QueueClosed)
    }

    pub fn consumer(&self) -> LineReceiver {
        LineReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Signal that no more producers will be created. Consumers are released once the
    /// handles that are still alive are dropped and the pending lines are drained.
    pub fn close(&mut self) {
        self.sender.take();
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    /// Number of lines waiting for a consumer.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// Producer side of a [RoutingQueue].
#[derive(Clone)]
pub struct LineSender {
    sender: Sender<Line>,
}

impl LineSender {
    /// Append a line, blocking while a bounded queue is full.
    pub fn enqueue(&self, line: Line) -> Result<(), PartitionError> {
        self.sender.send(line).map_err(|_| PartitionError::QueueClosed)
    }
}

/// Consumer side of a [RoutingQueue].
#[derive(Clone)]
pub struct LineReceiver {
    receiver: Receiver<Line>,
}

impl LineReceiver {
    /// Take the next line, blocking while the queue is empty and still open.
    /// Returns None once the queue is closed and drained.
    pub fn dequeue(&self) -> Option<Line> {
        self.receiver.recv().ok()
    }
}
