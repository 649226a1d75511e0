//! NMEA 0183 source: a GPS receiver's serial device, or a recorded log.
//!
//! Sentences are read line by line on a dedicated thread running a
//! current-thread runtime. `GGA` and `RMC` sentences from any talker are
//! understood; everything else is ignored. Each line read is bounded by the
//! policy timeout, and a timeout is reported as a failed sample without
//! ending the stream. End of input ends the stream.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    thread,
};

use jiff::Timestamp;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::{mpsc, oneshot},
};
use tracing::{debug, trace};

use crate::model::Position;

use super::{LocationError, PositionEvent, PositionSource, SamplingPolicy, Subscription};

/// Fixes with a horizontal dilution of precision above this are discarded
/// in high-accuracy mode.
const HIGH_ACCURACY_MAX_HDOP: f64 = 5.0;

/// A fix decoded from one sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub lat: f64,
    pub lng: f64,

    /// Horizontal dilution of precision, when the sentence carries it.
    pub hdop: Option<f64>,
}

/// Reads fixes from an NMEA device or file.
#[derive(Debug)]
pub struct NmeaSource {
    path: PathBuf,
    last_fix: Arc<Mutex<Option<Position>>>,
}

impl NmeaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_fix: Arc::default(),
        }
    }
}

impl PositionSource for NmeaSource {
    fn start(&mut self, policy: &SamplingPolicy) -> Result<Subscription, LocationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let cached = self
            .last_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(fix) = cached.filter(|fix| policy.is_fresh(fix, Timestamp::now())) {
            debug!("reusing cached fix");
            let _ = tx.send(PositionEvent::Sample(fix));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LocationError::new(format!("failed to start GPS reader: {e}")))?;

        let reader = Reader {
            policy: policy.clone(),
            last_fix: Arc::clone(&self.last_fix),
            tx,
        };
        let path = self.path.clone();
        thread::Builder::new()
            .name("plow-nmea".into())
            .spawn(move || {
                runtime.block_on(reader.run_path(path, stop_rx));
                // A serial read may still be parked on the blocking pool.
                runtime.shutdown_background();
            })
            .map_err(|e| LocationError::new(format!("failed to start GPS reader: {e}")))?;

        Ok(Subscription::new(rx, Some(stop_tx)))
    }
}

struct Reader {
    policy: SamplingPolicy,
    last_fix: Arc<Mutex<Option<Position>>>,
    tx: mpsc::UnboundedSender<PositionEvent>,
}

impl Reader {
    async fn run_path(self, path: PathBuf, stop: oneshot::Receiver<()>) {
        match tokio::fs::File::open(&path).await {
            Ok(file) => self.run(BufReader::new(file), stop).await,
            Err(e) => {
                self.emit_error(format!("GPS error: cannot open {}: {e}", path.display()));
            }
        }
    }

    async fn run<R>(self, input: R, mut stop: oneshot::Receiver<()>)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            tokio::select! {
                _ = &mut stop => break,
                read = tokio::time::timeout(self.policy.timeout, lines.next_line()) => match read {
                    Err(_) => self.emit_error(format!(
                        "GPS error: timeout after {}s",
                        self.policy.timeout.as_secs()
                    )),
                    Ok(Ok(Some(line))) => self.handle_line(&line),
                    Ok(Ok(None)) => break,
                    Ok(Err(e)) => {
                        self.emit_error(format!("GPS error: {e}"));
                        break;
                    }
                },
            }
            if self.tx.is_closed() {
                break;
            }
        }
        debug!("GPS reader stopped");
    }

    fn handle_line(&self, line: &str) {
        let Some(fix) = parse_sentence(line) else {
            trace!(line, "ignoring sentence");
            return;
        };
        if self.policy.high_accuracy && fix.hdop.is_some_and(|h| h > HIGH_ACCURACY_MAX_HDOP) {
            trace!(hdop = ?fix.hdop, "discarding imprecise fix");
            return;
        }
        let position = Position::now(fix.lat, fix.lng);
        *self.last_fix.lock().unwrap_or_else(PoisonError::into_inner) = Some(position.clone());
        let _ = self.tx.send(PositionEvent::Sample(position));
    }

    fn emit_error(&self, message: String) {
        let _ = self.tx.send(PositionEvent::Error(LocationError::new(message)));
    }
}

/// Decodes a `GGA` or `RMC` sentence into a fix.
///
/// Returns `None` for other sentence types, bad checksums, sentences
/// reporting no fix, and malformed or out-of-range coordinates.
pub fn parse_sentence(line: &str) -> Option<Fix> {
    let body = line.trim().strip_prefix('$')?;
    let body = match body.split_once('*') {
        Some((body, checksum)) => {
            let expected = u8::from_str_radix(checksum.trim(), 16).ok()?;
            if body.bytes().fold(0, |acc, b| acc ^ b) != expected {
                return None;
            }
            body
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let kind = fields.first()?;
    let suffix = kind.len().checked_sub(3).and_then(|start| kind.get(start..))?;
    let fix = match suffix {
        // $--GGA,time,lat,N,lon,E,quality,sats,hdop,...
        "GGA" => {
            let quality: u8 = fields.get(6)?.parse().ok()?;
            if quality == 0 {
                return None;
            }
            Some(Fix {
                lat: coordinate(fields.get(2)?, fields.get(3)?)?,
                lng: coordinate(fields.get(4)?, fields.get(5)?)?,
                hdop: fields.get(8).and_then(|h| h.parse().ok()),
            })
        }
        // $--RMC,time,status,lat,N,lon,E,...
        "RMC" => {
            if *fields.get(2)? != "A" {
                return None;
            }
            Some(Fix {
                lat: coordinate(fields.get(3)?, fields.get(4)?)?,
                lng: coordinate(fields.get(5)?, fields.get(6)?)?,
                hdop: None,
            })
        }
        _ => None,
    }?;
    (fix.lat.abs() <= 90.0 && fix.lng.abs() <= 180.0).then_some(fix)
}

/// Converts `(d)ddmm.mmmm` plus a hemisphere letter into signed decimal degrees.
fn coordinate(value: &str, hemisphere: &str) -> Option<f64> {
    let raw: f64 = value.parse().ok()?;
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return None;
    }
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}
