//! Tee Module
//!
//! Reads a byte stream once and hands every chunk to two bounded sinks
//! before pulling the next one, so the client relay and the cache upload
//! share one read loop and memory stays bounded by the channel depth.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::io;
use tokio::sync::mpsc;
use tracing::debug;

/// Chunks buffered per sink before the read loop waits
pub const RELAY_CHANNEL_DEPTH: usize = 4;

pub type Sink = mpsc::Sender<io::Result<Bytes>>;

/// Outcome of a finished tee
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeeReport {
    /// Bytes read from the source
    pub bytes: u64,
    pub read_error: Option<String>,
    pub primary_closed: bool,
    pub secondary_closed: bool,
}

/// Fans a source stream out to a primary and a secondary sink.
///
/// A sink whose receiver is gone is dropped and the other keeps receiving.
/// A read error is passed to every open sink and ends the tee.
pub struct Tee<S> {
    source: S,
    primary: Option<Sink>,
    secondary: Option<Sink>,
}

impl<S, E> Tee<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    pub fn new(source: S, primary: Sink, secondary: Sink) -> Self {
        Self {
            source,
            primary: Some(primary),
            secondary: Some(secondary),
        }
    }

    /// Drive the source to the end, dropping both sinks when done
    pub async fn run(self) -> TeeReport {
        let Tee {
            source,
            mut primary,
            mut secondary,
        } = self;
        let mut source = std::pin::pin!(source);
        let mut report = TeeReport::default();

        while let Some(item) = source.next().await {
            match item {
                Ok(chunk) => {
                    report.bytes += chunk.len() as u64;
                    deliver(&mut primary, Ok(chunk.clone())).await;
                    deliver(&mut secondary, Ok(chunk)).await;

                    if primary.is_none() && secondary.is_none() {
                        debug!(bytes = report.bytes, "Both tee sinks closed, stopping read");
                        break;
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    deliver(&mut primary, Err(io::Error::other(message.clone()))).await;
                    deliver(&mut secondary, Err(io::Error::other(message.clone()))).await;
                    report.read_error = Some(message);
                    break;
                }
            }
        }

        report.primary_closed = primary.is_none();
        report.secondary_closed = secondary.is_none();
        report
    }
}

async fn deliver(sink: &mut Option<Sink>, item: io::Result<Bytes>) {
    if let Some(tx) = sink {
        if tx.send(item).await.is_err() {
            *sink = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn source(
        items: Vec<Result<&'static str, &'static str>>,
    ) -> impl Stream<Item = Result<Bytes, String>> {
        stream::iter(items.into_iter().map(|item| {
            item.map(|s| Bytes::from_static(s.as_bytes()))
                .map_err(String::from)
        }))
    }

    async fn drain(mut rx: mpsc::Receiver<io::Result<Bytes>>) -> (Vec<u8>, Option<String>) {
        let mut data = Vec::new();
        let mut error = None;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => data.extend_from_slice(&chunk),
                Err(e) => error = Some(e.to_string()),
            }
        }
        (data, error)
    }

    #[tokio::test]
    async fn test_both_sinks_receive_every_chunk() {
        let (tx_a, rx_a) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        let (tx_b, rx_b) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        let tee = Tee::new(source(vec![Ok("test "), Ok("response")]), tx_a, tx_b);

        let (report, a, b) = tokio::join!(tee.run(), drain(rx_a), drain(rx_b));

        assert_eq!(report.bytes, 13);
        assert_eq!(report.read_error, None);
        assert!(!report.primary_closed);
        assert!(!report.secondary_closed);
        assert_eq!(a.0, b"test response");
        assert_eq!(b.0, b"test response");
    }

    #[tokio::test]
    async fn test_closed_primary_does_not_stop_secondary() {
        let (tx_a, rx_a) = mpsc::channel(1);
        let (tx_b, rx_b) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        drop(rx_a);
        let tee = Tee::new(source(vec![Ok("one"), Ok("two"), Ok("three")]), tx_a, tx_b);

        let (report, b) = tokio::join!(tee.run(), drain(rx_b));

        assert!(report.primary_closed);
        assert!(!report.secondary_closed);
        assert_eq!(b.0, b"onetwothree");
    }

    #[tokio::test]
    async fn test_closed_secondary_does_not_stop_primary() {
        let (tx_a, rx_a) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        let (tx_b, rx_b) = mpsc::channel(1);
        drop(rx_b);
        let tee = Tee::new(source(vec![Ok("one"), Ok("two")]), tx_a, tx_b);

        let (report, a) = tokio::join!(tee.run(), drain(rx_a));

        assert!(!report.primary_closed);
        assert!(report.secondary_closed);
        assert_eq!(a.0, b"onetwo");
    }

    #[tokio::test]
    async fn test_read_error_reaches_both_sinks() {
        let (tx_a, rx_a) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        let (tx_b, rx_b) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        let tee = Tee::new(
            source(vec![Ok("partial"), Err("connection reset"), Ok("never read")]),
            tx_a,
            tx_b,
        );

        let (report, a, b) = tokio::join!(tee.run(), drain(rx_a), drain(rx_b));

        assert_eq!(report.read_error.as_deref(), Some("connection reset"));
        assert_eq!(report.bytes, 7);
        assert_eq!(a.0, b"partial");
        assert_eq!(a.1.as_deref(), Some("connection reset"));
        assert_eq!(b.1.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn test_stops_reading_when_both_sinks_close() {
        let (tx_a, rx_a) = mpsc::channel(1);
        let (tx_b, rx_b) = mpsc::channel(1);
        drop(rx_a);
        drop(rx_b);
        let tee = Tee::new(source(vec![Ok("one"), Ok("two")]), tx_a, tx_b);

        let report = tee.run().await;

        assert_eq!(report.bytes, 3);
        assert!(report.primary_closed && report.secondary_closed);
    }
}
