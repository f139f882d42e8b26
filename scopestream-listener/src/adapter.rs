//! Contract for the external acquisition application.
//!
//! The vendor software is not controllable from here; it exposes only a
//! query surface: how many acquisition sessions exist, per-session metadata,
//! and pixel extraction for a subset of a session's data. The listener
//! treats this purely as a synchronous query capability and holds one
//! adapter instance per worker lifetime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The acquisition application could not be reached or the call failed
    /// in transit.
    #[error("Adapter transport error: {0}")]
    Transport(String),

    /// The acquisition application answered, but the response could not be
    /// interpreted.
    #[error("Malformed adapter response: {0}")]
    Malformed(String),
}

/// Per-session metadata reported by the acquisition application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Number of detection channels captured per timepoint.
    pub channel_count: u32,

    /// Number of z-slices captured per timepoint.
    pub slice_count: u32,

    /// Number of timepoints acquired so far. The vendor counts from 1;
    /// 0 means the session holds no data yet.
    pub timepoint_count: u32,

    /// Free-form time series description, e.g. `"10 Frames (2.5 s)"`.
    pub time_series_info: String,

    /// Vendor pixel type name, e.g. `"Gray16"`.
    pub pixel_type: String,

    /// Image height in pixels.
    pub height: u32,

    /// Image width in pixels.
    pub width: u32,
}

/// Subset of a session's data to extract, rendered in the vendor's
/// subset-string syntax: `T(<timepoint>)`, optionally `|C(<channel>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetSpec {
    /// 1-based timepoint index, as the vendor counts.
    timepoint: u32,

    /// Optional 1-based channel restriction.
    channel: Option<u32>,
}

impl SubsetSpec {
    /// Select all channels of one timepoint.
    pub fn timepoint(timepoint: u32) -> Self {
        Self {
            timepoint,
            channel: None,
        }
    }

    /// Restrict the selection to one channel.
    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Render the vendor subset string.
    pub fn render(&self) -> String {
        match self.channel {
            Some(channel) => format!("T({})|C({})", self.timepoint, channel),
            None => format!("T({})", self.timepoint),
        }
    }
}

impl std::fmt::Display for SubsetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Query surface of the external acquisition application.
///
/// All calls may block for the vendor's native call latency and may fail
/// with a transport-level error. Implementations wrap whatever scripting
/// interface the host application exposes.
#[async_trait]
pub trait AcquisitionAdapter: Send + Sync {
    /// Number of acquisition sessions the application currently holds.
    async fn session_count(&self) -> Result<i64, AdapterError>;

    /// Metadata of the session at `session` (0-based index).
    async fn session_metadata(&self, session: i64) -> Result<SessionMetadata, AdapterError>;

    /// Extract the raw pixel buffer for a subset of the session's data.
    ///
    /// The buffer is expected to hold `channel_count * height * width`
    /// samples, channel-major.
    async fn extract_pixels(
        &self,
        session: i64,
        subset: &SubsetSpec,
    ) -> Result<Vec<u16>, AdapterError>;
}

/// Creates one adapter instance per worker lifetime.
///
/// The supervisor never looks the acquisition application up ambiently; it
/// asks the factory for a fresh handle whenever it starts a worker, because
/// the handle is considered bound to one session's lifetime.
pub trait AdapterFactory: Send + Sync + 'static {
    type Adapter: AcquisitionAdapter + 'static;

    fn connect(&self) -> Result<Self::Adapter, AdapterError>;
}

impl<F, A> AdapterFactory for F
where
    F: Fn() -> Result<A, AdapterError> + Send + Sync + 'static,
    A: AcquisitionAdapter + 'static,
{
    type Adapter = A;

    fn connect(&self) -> Result<A, AdapterError> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_spec_timepoint_only() {
        assert_eq!(SubsetSpec::timepoint(2).render(), "T(2)");
    }

    #[test]
    fn test_subset_spec_with_channel() {
        assert_eq!(SubsetSpec::timepoint(5).with_channel(2).render(), "T(5)|C(2)");
    }

    #[test]
    fn test_subset_spec_display() {
        assert_eq!(SubsetSpec::timepoint(1).to_string(), "T(1)");
    }
}
