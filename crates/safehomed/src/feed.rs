//! Location feed over stdin
//!
//! The daemon's "scheduler" is whatever process pipes location fixes into
//! it, one JSON object per line:
//!
//! ```text
//! {"latitude": 14.6020, "longitude": 120.9842, "capturedAt": 1736424000000}
//! ```
//!
//! Malformed lines are logged and skipped; they never stop the feed.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use safehome_core::traits::LocationScheduler;
use safehome_core::{LocationSample, SamplingCadence, TrackingError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

/// Scheduler backed by an external feed process
///
/// The feed decides when to send fixes, so registering only records the
/// cadence the tracker asked for.
#[derive(Debug, Default)]
pub struct StdinScheduler {
    registered: AtomicBool,
}

impl StdinScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationScheduler for StdinScheduler {
    async fn register(&self, cadence: &SamplingCadence) -> Result<(), TrackingError> {
        self.registered.store(true, Ordering::SeqCst);
        info!(
            "Location feed should send a fix every {}s or {} m moved",
            cadence.interval_secs, cadence.distance_meters
        );
        Ok(())
    }

    async fn unregister(&self) -> Result<(), TrackingError> {
        self.registered.store(false, Ordering::SeqCst);
        info!("Location feed no longer needed");
        Ok(())
    }

    fn scheduler_name(&self) -> &'static str {
        "stdin"
    }
}

/// Samples read from the daemon's stdin
pub fn stdin_samples() -> impl Stream<Item = LocationSample> + Send {
    samples_from(BufReader::new(tokio::io::stdin()))
}

/// Samples parsed from JSON lines; ends at EOF or on a read error
pub fn samples_from<R>(reader: R) -> impl Stream<Item = LocationSample> + Send
where
    R: AsyncBufRead + Send + Unpin,
{
    LinesStream::new(reader.lines())
        .map_while(|line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                error!("Failed to read location feed: {}", e);
                None
            }
        })
        .filter_map(|line| parse_sample(&line))
}

fn parse_sample(line: &str) -> Option<LocationSample> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<LocationSample>(line) {
        Ok(sample) => Some(sample),
        Err(e) => {
            warn!("Skipping malformed location line: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_parse_sample() {
        let sample =
            parse_sample(r#"{"latitude": 14.6020, "longitude": 120.9842, "capturedAt": 1736424000000}"#)
                .unwrap();

        assert_eq!(sample.latitude, 14.6020);
        assert_eq!(sample.longitude, 120.9842);
        assert_eq!(
            Some(sample.captured_at),
            DateTime::from_timestamp_millis(1_736_424_000_000)
        );
    }

    #[test]
    fn test_malformed_lines_skipped() {
        assert!(parse_sample("").is_none());
        assert!(parse_sample("   ").is_none());
        assert!(parse_sample("not json").is_none());
        assert!(parse_sample(r#"{"latitude": 14.6}"#).is_none());
    }

    #[tokio::test]
    async fn test_stream_skips_bad_lines_and_ends_at_eof() {
        let input = b"{\"latitude\":1.0,\"longitude\":2.0,\"capturedAt\":0}\n\
                      garbage\n\
                      \n\
                      {\"latitude\":3.0,\"longitude\":4.0,\"capturedAt\":1000}\n";

        let samples: Vec<LocationSample> = samples_from(&input[..]).collect().await;

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].latitude, 1.0);
        assert_eq!(samples[1].longitude, 4.0);
    }

    #[tokio::test]
    async fn test_scheduler_tracks_registration() {
        let scheduler = StdinScheduler::new();
        assert!(!scheduler.is_registered());

        scheduler.register(&SamplingCadence::default()).await.unwrap();
        assert!(scheduler.is_registered());

        scheduler.unregister().await.unwrap();
        assert!(!scheduler.is_registered());
    }
}
