use std::sync::Arc;
use std::thread;

use command_executor::command::Command;

use crate::config::Config;
use crate::routing_queue::LineReceiver;
use crate::sink_registry::{SinkFactory, SinkRegistry};

/// Consumer of the routing queue. Appends every dequeued line to the sink of its key until
/// the queue is closed. After cancellation the queue is still drained so blocked producers
/// are released, but nothing more is written.
pub(crate) struct RouteCommand<F: SinkFactory> {
    receiver: LineReceiver,
    registry: Arc<SinkRegistry<F>>,
    config: Arc<Config>,
}

impl<F: SinkFactory> RouteCommand<F> {
    pub(crate) fn new(receiver: LineReceiver, registry: Arc<SinkRegistry<F>>, config: Arc<Config>) -> RouteCommand<F> {
        RouteCommand {
            receiver,
            registry,
            config,
        }
    }

    /// Returns the number of lines taken from the queue.
    pub(crate) fn drain(&self) -> u64 {
        let mut consumed = 0;
        while let Some(line) = self.receiver.dequeue() {
            consumed += 1;
            if self.config.is_cancelled() {
                continue;
            }
            self.registry.route(&line);
        }
        consumed
    }
}

impl<F: SinkFactory> Command for RouteCommand<F> {
    fn execute(&self) -> Result<(), anyhow::Error> {
        log::info!("Start routing lines, thread: {}", thread::current().name().unwrap_or("unnamed"));
        let consumed = self.drain();
        log::info!(
            "Finish routing lines, thread: {}, consumed: {} lines",
            thread::current().name().unwrap_or("unnamed"),
            consumed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;

    use crate::bucket_writer::RouteCommand;
    use crate::config::tests::test_config;
    use crate::routing_queue::RoutingQueue;
    use crate::sink_registry::tests::MemorySinkFactory;
    use crate::sink_registry::SinkRegistry;

    #[test]
    fn test_drain_until_closed() -> Result<(), anyhow::Error> {
        let config = Arc::new(test_config(PathBuf::new(), PathBuf::new()));
        let registry = Arc::new(SinkRegistry::new(MemorySinkFactory::default(), b'\n'));
        let mut queue = RoutingQueue::bounded(2);

        let writers: Vec<_> = (0..2)
            .map(|_| {
                let command = RouteCommand::new(queue.consumer(), registry.clone(), config.clone());
                thread::spawn(move || command.drain())
            })
            .collect();

        let producer = queue.producer()?;
        for line in ["Apple", "banana", "Avocado", "cherry", "apricot"] {
            producer.enqueue(line.as_bytes().to_vec())?;
        }
        drop(producer);
        queue.close();

        let consumed: u64 = writers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(consumed, 5);
        assert_eq!(registry.close_all().complete.len(), 3);
        assert_eq!(registry.written(), 5);
        Ok(())
    }

    #[test]
    fn test_cancelled_writer_drains_without_writing() -> Result<(), anyhow::Error> {
        let config = test_config(PathBuf::new(), PathBuf::new());
        config.cancel_for_test();
        let registry = Arc::new(SinkRegistry::new(MemorySinkFactory::default(), b'\n'));
        let mut queue = RoutingQueue::unbounded();
        let producer = queue.producer()?;
        producer.enqueue(b"apple".to_vec())?;
        producer.enqueue(b"banana".to_vec())?;
        drop(producer);
        queue.close();

        let command = RouteCommand::new(queue.consumer(), registry.clone(), Arc::new(config));
        assert_eq!(command.drain(), 2);
        assert_eq!(registry.written(), 0);
        assert!(registry.close_all().complete.is_empty());
        Ok(())
    }
}
