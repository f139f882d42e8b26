//! In-process event bus for listener events.
//!
//! One broadcast channel per event kind. Publishing is fire-and-forget to
//! all current subscribers in subscription order; a subscriber that joins
//! after an event was published never sees it. The bus is explicitly
//! constructed and passed to every component that publishes or subscribes —
//! there is no ambient instance.

use scopestream_common::{AcquisitionSettings, DocumentMarker, ImageFrame};
use tokio::sync::broadcast;

/// Per-channel buffer for subscribers that fall behind the publisher.
const CHANNEL_CAPACITY: usize = 256;

/// Process-wide publish/subscribe channels.
///
/// Cloning the bus clones the channel handles, not the channels: all clones
/// publish to and subscribe from the same subscriber sets.
#[derive(Clone)]
pub struct EventBus {
    reset: broadcast::Sender<()>,
    session_detected: broadcast::Sender<DocumentMarker>,
    settings_changed: broadcast::Sender<AcquisitionSettings>,
    frame: broadcast::Sender<ImageFrame>,
    acquisition_started: broadcast::Sender<()>,
    acquisition_ended: broadcast::Sender<()>,
}

impl EventBus {
    /// Create a bus with empty subscriber sets on all channels.
    pub fn new() -> Self {
        Self {
            reset: broadcast::channel(CHANNEL_CAPACITY).0,
            session_detected: broadcast::channel(CHANNEL_CAPACITY).0,
            settings_changed: broadcast::channel(CHANNEL_CAPACITY).0,
            frame: broadcast::channel(CHANNEL_CAPACITY).0,
            acquisition_started: broadcast::channel(CHANNEL_CAPACITY).0,
            acquisition_ended: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Request a hot-reset of the listener.
    pub fn publish_reset(&self) {
        let _ = self.reset.send(());
    }

    pub fn subscribe_reset(&self) -> broadcast::Receiver<()> {
        self.reset.subscribe()
    }

    /// Announce a newly detected acquisition session.
    pub fn publish_session_detected(&self, marker: DocumentMarker) {
        let _ = self.session_detected.send(marker);
    }

    pub fn subscribe_session_detected(&self) -> broadcast::Receiver<DocumentMarker> {
        self.session_detected.subscribe()
    }

    /// Announce the current session's channel/slice configuration.
    pub fn publish_settings_changed(&self, settings: AcquisitionSettings) {
        let _ = self.settings_changed.send(settings);
    }

    pub fn subscribe_settings_changed(&self) -> broadcast::Receiver<AcquisitionSettings> {
        self.settings_changed.subscribe()
    }

    /// Publish one decoded image plane.
    pub fn publish_frame(&self, frame: ImageFrame) {
        let _ = self.frame.send(frame);
    }

    pub fn subscribe_frame(&self) -> broadcast::Receiver<ImageFrame> {
        self.frame.subscribe()
    }

    /// Announce that the listener started streaming a session.
    pub fn publish_acquisition_started(&self) {
        let _ = self.acquisition_started.send(());
    }

    pub fn subscribe_acquisition_started(&self) -> broadcast::Receiver<()> {
        self.acquisition_started.subscribe()
    }

    /// Announce that the listener stopped streaming a session.
    pub fn publish_acquisition_ended(&self) {
        let _ = self.acquisition_ended.send(());
    }

    pub fn subscribe_acquisition_ended(&self) -> broadcast::Receiver<()> {
        self.acquisition_ended.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fire_and_forget() {
        let bus = EventBus::new();
        // No receivers anywhere; none of these may panic or error out.
        bus.publish_reset();
        bus.publish_session_detected(0);
        bus.publish_acquisition_started();
    }

    #[tokio::test]
    async fn test_all_current_subscribers_receive() {
        let bus = EventBus::new();
        let mut a = bus.subscribe_session_detected();
        let mut b = bus.subscribe_session_detected();

        bus.publish_session_detected(3);

        assert_eq!(a.recv().await.unwrap(), 3);
        assert_eq!(b.recv().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_nothing() {
        let bus = EventBus::new();
        let mut early = bus.subscribe_session_detected();

        bus.publish_session_detected(1);

        let mut late = bus.subscribe_session_detected();
        bus.publish_session_detected(2);

        assert_eq!(early.recv().await.unwrap(), 1);
        assert_eq!(early.recv().await.unwrap(), 2);
        // The late subscriber only observes events published after it joined.
        assert_eq!(late.recv().await.unwrap(), 2);
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clones_share_channels() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut rx = clone.subscribe_reset();

        bus.publish_reset();

        assert!(rx.recv().await.is_ok());
    }
}
