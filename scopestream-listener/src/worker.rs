//! Listener worker: session detection and timepoint streaming.
//!
//! One worker runs per supervisor start/reset cycle, on its own task. It
//! first polls the session count until a session the supervisor has not yet
//! seen appears, then streams that session's timepoints as frame events
//! until told to stop. A worker is never reused: once stopped it takes no
//! further adapter action and its task exits.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use scopestream_common::{
    AcquisitionSettings, DocumentMarker, ImageFrame, ListenerState,
};

use crate::adapter::{AcquisitionAdapter, SessionMetadata, SubsetSpec};
use crate::bus::EventBus;
use crate::config::ListenerConfig;

/// Elapsed-time pattern embedded in the vendor's time series info,
/// e.g. `"10 Frames (2.5 s)"`.
static ELAPSED_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d* Frames \((\d*.\d*) s\)").expect("elapsed-time pattern is valid")
});

/// Parse the elapsed acquisition time out of the vendor's time series info,
/// in milliseconds. `None` when the expected pattern is absent.
pub(crate) fn parse_elapsed_ms(info: &str) -> Option<u64> {
    let caps = ELAPSED_TIME_RE.captures(info)?;
    let secs: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some((secs * 1000.0) as u64)
}

/// Polls the acquisition adapter and republishes what it finds on the bus.
pub struct ListenerWorker<A> {
    adapter: A,
    bus: EventBus,
    config: ListenerConfig,
    marker: DocumentMarker,
    stop_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<ListenerState>,
}

impl<A: AcquisitionAdapter> ListenerWorker<A> {
    /// Create a worker seeded with the last session marker the supervisor
    /// has seen. The worker reports state transitions through `state_tx`
    /// and observes `stop_rx` between poll ticks.
    pub fn new(
        adapter: A,
        bus: EventBus,
        config: ListenerConfig,
        marker: DocumentMarker,
        stop_rx: watch::Receiver<bool>,
        state_tx: watch::Sender<ListenerState>,
    ) -> Self {
        state_tx.send_replace(ListenerState::Idle);
        Self {
            adapter,
            bus,
            config,
            marker,
            stop_rx,
            state_tx,
        }
    }

    /// Run until a new session has been fully streamed or a stop signal is
    /// observed. Returns the last session marker this worker has seen, so
    /// the supervisor can seed its successor.
    pub async fn run(mut self) -> DocumentMarker {
        self.set_state(ListenerState::WaitingForSession);

        if self.wait_for_session().await {
            info!(marker = self.marker, "Acquisition session detected");
            self.bus.publish_session_detected(self.marker);

            self.set_state(ListenerState::Watching);
            self.bus.publish_acquisition_started();

            self.watch_session().await;
            self.bus.publish_acquisition_ended();
        }

        // Terminal. No adapter call happens past this point.
        self.set_state(ListenerState::Stopped);
        self.marker
    }

    /// Poll the session count until it moves past the seed marker.
    ///
    /// Returns `false` when a stop signal arrived first. When the change is
    /// only observed after at least one unchanged poll, an additional
    /// settle delay is applied before the session is trusted: session
    /// creation in the external application is itself multi-step and a
    /// premature metadata read returns inconsistent values.
    async fn wait_for_session(&mut self) -> bool {
        let mut waited = false;

        loop {
            if self.stop_requested() {
                return false;
            }

            match self.adapter.session_count().await {
                Ok(count) if count - 1 != self.marker => {
                    if waited {
                        debug!(
                            settle_ms = self.config.settle_delay_ms,
                            "Session count changed, letting the session settle"
                        );
                        if self.sleep_or_stop(self.config.settle_delay()).await {
                            return false;
                        }
                    }
                    self.marker = count - 1;
                    return true;
                }
                Ok(_) => {
                    debug!("Waiting for a new acquisition session");
                }
                Err(e) => {
                    warn!(error = %e, "Session count poll failed");
                }
            }

            waited = true;
            if self.sleep_or_stop(self.config.session_poll_interval()).await {
                return false;
            }
        }
    }

    /// Stream the detected session's timepoints until stopped.
    ///
    /// Metadata is re-read on a fixed interval; a cycle whose timepoint
    /// count is unchanged carries no new data and is skipped. Adapter
    /// errors never end the loop: a failed metadata read skips the cycle
    /// and a failed extraction degrades to zero-filled frames.
    async fn watch_session(&mut self) {
        let mut last_timepoint_count: Option<u32> = None;
        let mut last_settings: Option<AcquisitionSettings> = None;

        loop {
            if self.sleep_or_stop(self.config.watch_interval()).await {
                return;
            }

            let meta = match self.adapter.session_metadata(self.marker).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(error = %e, "Metadata read failed, skipping cycle");
                    continue;
                }
            };

            if last_timepoint_count == Some(meta.timepoint_count) {
                continue;
            }
            last_timepoint_count = Some(meta.timepoint_count);

            // The vendor counts timepoints from 1; zero means no data yet.
            if meta.timepoint_count == 0 {
                continue;
            }

            let settings = AcquisitionSettings {
                channels: meta.channel_count,
                slices: meta.slice_count,
            };
            if last_settings != Some(settings) {
                debug!(
                    channels = settings.channels,
                    slices = settings.slices,
                    "Publishing acquisition settings"
                );
                self.bus.publish_settings_changed(settings);
                last_settings = Some(settings);
            }

            debug!(timepoint = meta.timepoint_count, "New timepoint");
            self.emit_timepoint(&meta).await;
        }
    }

    /// Extract and publish one frame per channel for the newest timepoint.
    async fn emit_timepoint(&mut self, meta: &SessionMetadata) {
        let elapsed_ms = parse_elapsed_ms(&meta.time_series_info);
        if elapsed_ms.is_none() {
            warn!(
                info = %meta.time_series_info,
                "No elapsed time found in time series info"
            );
        }

        // The vendor counts timepoints from 1; events carry 0-based indices.
        let timepoint = meta.timepoint_count - 1;
        let subset = SubsetSpec::timepoint(meta.timepoint_count);
        let plane_len = (meta.width as usize) * (meta.height as usize);
        let expected_len = plane_len * meta.channel_count as usize;

        let pixels = match self.adapter.extract_pixels(self.marker, &subset).await {
            Ok(buf) if buf.len() == expected_len => Some(buf),
            Ok(buf) => {
                warn!(
                    got = buf.len(),
                    expected = expected_len,
                    "Pixel buffer has unexpected shape, substituting blank frames"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, subset = %subset, "Could not read image data");
                None
            }
        };

        // One frame per channel, in channel order. Extraction failure
        // degrades to blank placeholders instead of dropping the timepoint,
        // so downstream timepoint indices stay contiguous.
        for channel in 0..meta.channel_count {
            let frame = match &pixels {
                Some(buf) => {
                    let start = plane_len * channel as usize;
                    ImageFrame::new(
                        buf[start..start + plane_len].to_vec(),
                        meta.width,
                        meta.height,
                        timepoint,
                        channel,
                        elapsed_ms,
                    )
                }
                None => ImageFrame::blank(meta.width, meta.height, timepoint, channel, elapsed_ms),
            };
            self.bus.publish_frame(frame);
        }
    }

    fn set_state(&self, state: ListenerState) {
        debug!(state = %state, "Worker state transition");
        self.state_tx.send_replace(state);
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Sleep for `duration`, waking early on a stop signal. Returns `true`
    /// when stop was observed.
    async fn sleep_or_stop(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = self.stop_rx.changed() => match changed {
                Ok(()) => *self.stop_rx.borrow(),
                // Sender gone means the supervisor dropped us; stop.
                Err(_) => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elapsed_ms() {
        assert_eq!(parse_elapsed_ms("10 Frames (2.5 s)"), Some(2500));
        assert_eq!(parse_elapsed_ms("1 Frames (0.1 s)"), Some(100));
    }

    #[test]
    fn test_parse_elapsed_ms_case_insensitive() {
        assert_eq!(parse_elapsed_ms("3 FRAMES (1.0 S)"), Some(1000));
    }

    #[test]
    fn test_parse_elapsed_ms_missing_pattern() {
        assert_eq!(parse_elapsed_ms(""), None);
        assert_eq!(parse_elapsed_ms("continuous acquisition"), None);
    }

    #[test]
    fn test_parse_elapsed_ms_embedded_in_text() {
        assert_eq!(
            parse_elapsed_ms("Time Series: 42 Frames (21.0 s), interval 0.5 s"),
            Some(21000)
        );
    }
}
