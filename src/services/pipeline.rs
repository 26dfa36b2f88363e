//! Streaming reader sessions
//!
//! Each [`MarcReader`] owns one producer thread that decodes records and
//! pushes them into a bounded queue, and is itself the single consumer.
//! Delivery order is input order. Record-level errors travel through the
//! queue like records; a stream-level error is delivered once and is
//! followed by end of stream.

use std::io::{BufReader, Read};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use futures::Stream;
use tokio::sync::mpsc;

use crate::config::{ReaderConfig, SourceFormat};
use crate::domain::{MarcError, Result};
use crate::models::Record;
use crate::modules::charset::Encoding;
use crate::modules::marc::{BinaryDecoder, XmlDecoder, XmlInput, XmlTransform};

type RecordSource = Box<dyn Iterator<Item = Result<Record>> + Send>;

enum QueueEntry {
    Record(Record),
    Error(MarcError),
    EndOfStream,
}

/// Lifecycle of a reader session, as seen by the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Producer still decoding
    Running,
    /// Producer finished, buffered entries remain
    Draining,
    /// A stream-level error was delivered; only end of stream follows
    Failed,
    Closed,
}

/// Configures and opens a [`MarcReader`].
pub struct ReaderBuilder {
    config: ReaderConfig,
    transform: Option<Box<dyn XmlTransform>>,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self {
            config: ReaderConfig::default(),
            transform: None,
        }
    }

    /// Replaces every option set so far except the transform.
    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn format(mut self, format: SourceFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Runs `transform` over the raw input before MARCXML decoding.
    /// Implies an XML source.
    pub fn transform(mut self, transform: impl XmlTransform + 'static) -> Self {
        self.config.format = SourceFormat::Xml;
        self.transform = Some(Box::new(transform));
        self
    }

    /// Decode binary records with `encoding` whatever their leaders declare.
    pub fn encoding_override(mut self, encoding: Encoding) -> Self {
        self.config.encoding_override = Some(encoding);
        self
    }

    /// Bounded queue size. Values below 1 are raised to 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Starts the producer thread over `input`.
    pub fn open<R>(self, input: R) -> Result<MarcReader>
    where
        R: Read + Send + 'static,
    {
        let ReaderBuilder { config, transform } = self;
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = Arc::new(AtomicBool::new(false));
        let producer_done = Arc::new(AtomicBool::new(false));

        let producer = Producer {
            tx,
            cancel: Arc::clone(&cancel),
            done: Arc::clone(&producer_done),
        };
        let input: Box<dyn Read + Send> = Box::new(input);

        tracing::debug!(
            "Opening {} MARC reader (queue capacity {})",
            config.format,
            capacity
        );

        let handle = std::thread::Builder::new()
            .name("marc-producer".to_string())
            .spawn(move || match open_source(input, &config, transform) {
                Ok(source) => producer.run(source),
                Err(e) => producer.abort(e),
            })?;

        Ok(MarcReader {
            rx,
            peeked: None,
            state: StreamState::Running,
            cancel,
            producer_done,
            producer: Some(handle),
        })
    }
}

fn open_source(
    input: Box<dyn Read + Send>,
    config: &ReaderConfig,
    transform: Option<Box<dyn XmlTransform>>,
) -> Result<RecordSource> {
    match config.format {
        SourceFormat::Binary => Ok(Box::new(
            BinaryDecoder::new(input).with_encoding_override(config.encoding_override),
        )),
        SourceFormat::Xml => {
            if config.encoding_override.is_some() {
                tracing::debug!("Encoding override has no effect on XML sources");
            }
            let mut xml: XmlInput = Box::new(BufReader::new(input));
            if let Some(transform) = transform {
                xml = transform.transform(xml).map_err(|e| match e {
                    MarcError::Transform(_) => e,
                    other => MarcError::Transform(other.to_string()),
                })?;
            }
            Ok(Box::new(XmlDecoder::new(xml)))
        }
    }
}

/// Producer half, moved into the decoding thread
struct Producer {
    tx: mpsc::Sender<QueueEntry>,
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl Producer {
    fn run(self, source: RecordSource) {
        tracing::debug!("MARC producer started");
        let mut delivered = 0usize;

        for item in source {
            if self.cancel.load(Ordering::Acquire) {
                tracing::debug!("MARC producer cancelled after {} entries", delivered);
                return;
            }
            let fatal = match &item {
                Ok(_) => false,
                Err(e) if e.is_fatal() => {
                    tracing::error!("Stopping MARC stream: {}", e);
                    true
                }
                Err(e) => {
                    tracing::warn!("Skipping record: {}", e);
                    false
                }
            };
            let entry = match item {
                Ok(record) => QueueEntry::Record(record),
                Err(e) => QueueEntry::Error(e),
            };
            if self.tx.blocking_send(entry).is_err() {
                tracing::debug!("MARC consumer went away, producer exiting");
                return;
            }
            delivered += 1;
            if fatal {
                break;
            }
        }

        self.end(delivered);
    }

    fn abort(self, error: MarcError) {
        tracing::error!("Could not open MARC source: {}", error);
        if self.tx.blocking_send(QueueEntry::Error(error)).is_ok() {
            self.end(1);
        }
    }

    fn end(self, delivered: usize) {
        self.done.store(true, Ordering::Release);
        // Fails only when the consumer already closed
        let _ = self.tx.blocking_send(QueueEntry::EndOfStream);
        tracing::debug!("MARC producer finished after {} entries", delivered);
    }
}

/// A streaming reader over MARC binary or MARCXML input.
///
/// Iterating yields `Ok(record)` for each decoded record and `Err(e)` for
/// each record that could not be decoded, in input order. The blocking
/// methods must not be called from inside an async runtime; use
/// [`into_stream`](Self::into_stream) there.
pub struct MarcReader {
    rx: mpsc::Receiver<QueueEntry>,
    peeked: Option<QueueEntry>,
    state: StreamState,
    cancel: Arc<AtomicBool>,
    producer_done: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl MarcReader {
    pub fn builder() -> ReaderBuilder {
        ReaderBuilder::new()
    }

    pub fn binary<R: Read + Send + 'static>(input: R) -> Result<Self> {
        Self::builder().format(SourceFormat::Binary).open(input)
    }

    pub fn xml<R: Read + Send + 'static>(input: R) -> Result<Self> {
        Self::builder().format(SourceFormat::Xml).open(input)
    }

    pub fn state(&self) -> StreamState {
        match self.state {
            StreamState::Running if self.producer_done.load(Ordering::Acquire) => {
                StreamState::Draining
            }
            state => state,
        }
    }

    /// Blocks until an entry is available or the stream has ended. Does not
    /// consume anything.
    pub fn has_next(&mut self) -> bool {
        if self.state == StreamState::Closed {
            return false;
        }
        if self.peeked.is_none() {
            self.peeked = self.rx.blocking_recv();
        }
        match self.peeked {
            Some(QueueEntry::EndOfStream) => {
                self.finish();
                false
            }
            Some(_) => true,
            None => {
                tracing::error!("MARC producer exited without signaling end of stream");
                self.finish();
                false
            }
        }
    }

    /// Stops the producer and discards anything still buffered. Safe to call
    /// more than once; never waits for the producer.
    pub fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        self.cancel.store(true, Ordering::Release);
        self.rx.close();
        let mut discarded = usize::from(self.peeked.take().is_some());
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        // Detached: a producer blocked in its source exits on its own
        self.producer = None;
        self.state = StreamState::Closed;
        tracing::debug!("MARC reader closed, {} buffered entries discarded", discarded);
    }

    /// Async view of the same session. The producer thread keeps running.
    pub fn into_stream(self) -> RecordStream {
        RecordStream { reader: self }
    }

    fn deliver(&mut self, entry: QueueEntry) -> Option<Result<Record>> {
        match entry {
            QueueEntry::Record(record) => Some(Ok(record)),
            QueueEntry::Error(e) => {
                if e.is_fatal() {
                    self.state = StreamState::Failed;
                }
                Some(Err(e))
            }
            QueueEntry::EndOfStream => {
                self.finish();
                None
            }
        }
    }

    fn finish(&mut self) {
        self.peeked = None;
        self.state = StreamState::Closed;
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                tracing::error!("MARC producer thread panicked");
            }
        }
    }
}

impl Iterator for MarcReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let entry = self.peeked.take()?;
        self.deliver(entry)
    }
}

impl Drop for MarcReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// [`MarcReader`] as a `futures::Stream`
pub struct RecordStream {
    reader: MarcReader,
}

impl RecordStream {
    pub fn state(&self) -> StreamState {
        self.reader.state()
    }

    pub fn close(&mut self) {
        self.reader.close();
    }
}

impl Stream for RecordStream {
    type Item = Result<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let reader = &mut self.get_mut().reader;
        if reader.state == StreamState::Closed {
            return Poll::Ready(None);
        }
        if let Some(entry) = reader.peeked.take() {
            return Poll::Ready(reader.deliver(entry));
        }
        match reader.rx.poll_recv(cx) {
            Poll::Ready(Some(entry)) => {
                if matches!(entry, QueueEntry::EndOfStream) {
                    // Joining is instant once the sentinel is out, but stay off the runtime
                    reader.producer = None;
                }
                Poll::Ready(reader.deliver(entry))
            }
            Poll::Ready(None) => {
                reader.producer = None;
                reader.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
