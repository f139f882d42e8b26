//! Scripted mock acquisition application for demos and tests.
//!
//! `MockAcquisition` is the scripting handle: it mutates the simulated
//! application state (session count, metadata, pixel data, injected
//! failures) while one or more `MockAdapter` handles serve the listener's
//! queries from that state.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::adapter::{AcquisitionAdapter, AdapterError, SessionMetadata, SubsetSpec};

#[derive(Debug, Default)]
struct MockState {
    session_count: i64,
    metadata: Option<SessionMetadata>,
    pixels: Option<Vec<u16>>,
    fail_session_count: bool,
    fail_metadata: bool,
    fail_extraction: bool,
}

/// Handle for scripting the mock acquisition application.
#[derive(Clone, Default)]
pub struct MockAcquisition {
    state: Arc<Mutex<MockState>>,
}

impl MockAcquisition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an adapter handle serving queries from this mock.
    pub fn adapter(&self) -> MockAdapter {
        MockAdapter {
            state: self.state.clone(),
        }
    }

    /// Begin a new session with the given metadata.
    pub fn start_session(&self, metadata: SessionMetadata) {
        let mut state = self.lock();
        state.session_count += 1;
        state.metadata = Some(metadata);
    }

    /// Advance the current session's timepoint count.
    pub fn set_timepoint_count(&self, count: u32) {
        if let Some(metadata) = self.lock().metadata.as_mut() {
            metadata.timepoint_count = count;
        }
    }

    /// Override the current session's time series info string.
    pub fn set_time_series_info(&self, info: impl Into<String>) {
        if let Some(metadata) = self.lock().metadata.as_mut() {
            metadata.time_series_info = info.into();
        }
    }

    /// Set the pixel buffer returned by extraction.
    pub fn set_pixels(&self, pixels: Vec<u16>) {
        self.lock().pixels = Some(pixels);
    }

    /// Make session-count queries fail with a transport error.
    pub fn fail_session_count(&self, fail: bool) {
        self.lock().fail_session_count = fail;
    }

    /// Make metadata queries fail with a transport error.
    pub fn fail_metadata(&self, fail: bool) {
        self.lock().fail_metadata = fail;
    }

    /// Make pixel extraction fail with a transport error.
    pub fn fail_extraction(&self, fail: bool) {
        self.lock().fail_extraction = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock poisoned")
    }
}

/// Adapter handle backed by a [`MockAcquisition`].
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl AcquisitionAdapter for MockAdapter {
    async fn session_count(&self) -> Result<i64, AdapterError> {
        let state = self.state.lock().expect("mock state lock poisoned");
        if state.fail_session_count {
            return Err(AdapterError::Transport(
                "acquisition application unreachable".to_string(),
            ));
        }
        Ok(state.session_count)
    }

    async fn session_metadata(&self, session: i64) -> Result<SessionMetadata, AdapterError> {
        let state = self.state.lock().expect("mock state lock poisoned");
        if state.fail_metadata {
            return Err(AdapterError::Transport("metadata read failed".to_string()));
        }
        if session != state.session_count - 1 {
            return Err(AdapterError::Malformed(format!(
                "no session at index {}",
                session
            )));
        }
        state
            .metadata
            .clone()
            .ok_or_else(|| AdapterError::Malformed("session has no metadata".to_string()))
    }

    async fn extract_pixels(
        &self,
        _session: i64,
        _subset: &SubsetSpec,
    ) -> Result<Vec<u16>, AdapterError> {
        let state = self.state.lock().expect("mock state lock poisoned");
        if state.fail_extraction {
            return Err(AdapterError::Transport(
                "pixel extraction failed".to_string(),
            ));
        }
        state
            .pixels
            .clone()
            .ok_or_else(|| AdapterError::Transport("no pixel data available".to_string()))
    }
}

/// Generate session metadata with a parseable time series info string.
pub fn session_metadata(channels: u32, timepoints: u32, width: u32, height: u32) -> SessionMetadata {
    SessionMetadata {
        channel_count: channels,
        slice_count: 1,
        timepoint_count: timepoints,
        time_series_info: format!("{} Frames ({:.1} s)", timepoints, timepoints as f64 * 0.5),
        pixel_type: "Gray16".to_string(),
        height,
        width,
    }
}

/// Generate a channel-major pixel buffer where the plane for channel `c` is
/// filled with the value `(c + 1) * 1000`, so tests can tell planes apart.
pub fn plane_pixels(channels: u32, width: u32, height: u32) -> Vec<u16> {
    let plane_len = (width as usize) * (height as usize);
    (0..channels)
        .flat_map(|c| std::iter::repeat_n((c as u16 + 1) * 1000, plane_len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_mock_has_no_sessions() {
        let acquisition = MockAcquisition::new();
        let adapter = acquisition.adapter();

        assert_eq!(adapter.session_count().await.unwrap(), 0);
        assert!(adapter.session_metadata(0).await.is_err());
    }

    #[tokio::test]
    async fn test_start_session_increments_count() {
        let acquisition = MockAcquisition::new();
        let adapter = acquisition.adapter();

        acquisition.start_session(session_metadata(2, 1, 4, 4));

        assert_eq!(adapter.session_count().await.unwrap(), 1);
        let meta = adapter.session_metadata(0).await.unwrap();
        assert_eq!(meta.channel_count, 2);
        assert_eq!(meta.timepoint_count, 1);
    }

    #[tokio::test]
    async fn test_injected_extraction_failure() {
        let acquisition = MockAcquisition::new();
        let adapter = acquisition.adapter();

        acquisition.start_session(session_metadata(1, 1, 2, 2));
        acquisition.set_pixels(plane_pixels(1, 2, 2));
        acquisition.fail_extraction(true);

        let result = adapter
            .extract_pixels(0, &SubsetSpec::timepoint(1))
            .await;
        assert!(matches!(result, Err(AdapterError::Transport(_))));
    }

    #[test]
    fn test_plane_pixels_layout() {
        let pixels = plane_pixels(2, 3, 2);
        assert_eq!(pixels.len(), 12);
        assert!(pixels[..6].iter().all(|&p| p == 1000));
        assert!(pixels[6..].iter().all(|&p| p == 2000));
    }

    #[test]
    fn test_generated_metadata_is_parseable() {
        let meta = session_metadata(2, 4, 8, 8);
        assert_eq!(meta.time_series_info, "4 Frames (2.0 s)");
    }
}
