use serde::{Deserialize, Serialize};

/// Index of the last acquisition session a listener has processed.
///
/// `NO_SESSION` (-1) means no session has been seen yet; the external
/// application numbers sessions from 0.
pub type DocumentMarker = i64;

/// Marker value for "no session seen yet".
pub const NO_SESSION: DocumentMarker = -1;

/// One decoded image plane emitted by the listener.
///
/// Frames are immutable values: the listener creates one per
/// (timepoint, channel) pair and subscribers consume and discard them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    /// Raw pixel data, row-major, `width * height` samples.
    pub pixels: Vec<u16>,

    /// Plane width in pixels.
    pub width: u32,

    /// Plane height in pixels.
    pub height: u32,

    /// 0-based temporal index within the session.
    pub timepoint: u32,

    /// 0-based detection channel index.
    pub channel: u32,

    /// 0-based z-slice index. Reserved; currently always 0.
    pub slice: u32,

    /// Milliseconds since acquisition start, when the source metadata
    /// carried a parseable elapsed time.
    pub elapsed_ms: Option<u64>,
}

impl ImageFrame {
    /// Create a frame from a decoded pixel plane.
    pub fn new(
        pixels: Vec<u16>,
        width: u32,
        height: u32,
        timepoint: u32,
        channel: u32,
        elapsed_ms: Option<u64>,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            timepoint,
            channel,
            slice: 0,
            elapsed_ms,
        }
    }

    /// Create a zero-filled placeholder frame of the expected shape.
    ///
    /// Used when pixel extraction fails: subscribers still receive one
    /// event per channel and timepoint indices stay contiguous.
    pub fn blank(
        width: u32,
        height: u32,
        timepoint: u32,
        channel: u32,
        elapsed_ms: Option<u64>,
    ) -> Self {
        Self::new(
            vec![0; (width as usize) * (height as usize)],
            width,
            height,
            timepoint,
            channel,
            elapsed_ms,
        )
    }

    /// Whether every pixel in this frame is zero.
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }
}

/// Channel and slice counts of the current acquisition session.
///
/// Published once per detected session and reissued only when the external
/// application reports different counts; subscribers compare values to
/// detect a configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Number of detection channels per timepoint.
    pub channels: u32,

    /// Number of z-slices per timepoint.
    pub slices: u32,
}

/// Lifecycle states of a listener worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    /// Constructed, not yet polling.
    Idle,
    /// Polling for a session index different from the seed marker.
    WaitingForSession,
    /// Session found; streaming timepoints.
    Watching,
    /// Stop observed. Terminal: a stopped worker is discarded, never reused.
    Stopped,
}

impl ListenerState {
    /// String name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerState::Idle => "idle",
            ListenerState::WaitingForSession => "waiting_for_session",
            ListenerState::Watching => "watching",
            ListenerState::Stopped => "stopped",
        }
    }

    /// Whether this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListenerState::Stopped)
    }
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_shape() {
        let frame = ImageFrame::blank(4, 3, 7, 1, Some(1500));
        assert_eq!(frame.pixels.len(), 12);
        assert!(frame.is_blank());
        assert_eq!(frame.timepoint, 7);
        assert_eq!(frame.channel, 1);
        assert_eq!(frame.slice, 0);
        assert_eq!(frame.elapsed_ms, Some(1500));
    }

    #[test]
    fn test_frame_is_not_blank_with_data() {
        let frame = ImageFrame::new(vec![0, 1, 0, 0], 2, 2, 0, 0, None);
        assert!(!frame.is_blank());
    }

    #[test]
    fn test_settings_comparison() {
        let a = AcquisitionSettings { channels: 2, slices: 1 };
        let b = AcquisitionSettings { channels: 2, slices: 1 };
        let c = AcquisitionSettings { channels: 3, slices: 1 };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_state_terminal() {
        assert!(!ListenerState::Idle.is_terminal());
        assert!(!ListenerState::WaitingForSession.is_terminal());
        assert!(!ListenerState::Watching.is_terminal());
        assert!(ListenerState::Stopped.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ListenerState::WaitingForSession.to_string(), "waiting_for_session");
        assert_eq!(ListenerState::Watching.to_string(), "watching");
    }
}
