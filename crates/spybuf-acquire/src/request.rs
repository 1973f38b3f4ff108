use std::fmt;

use spybuf_proto::{DumpSpyBuffersChunkRequest, DumpSpyBuffersRequest};
use uuid::Uuid;

use crate::error::{AcquireError, Result};

/// Highest channel id on the front-end.
pub const MAX_CHANNEL_ID: u32 = 39;

/// Bytes per sample on the wire.
pub const WIRE_BYTES_PER_SAMPLE: usize = 4;

// Longest varint encoding of a packed `u32` sample.
const MAX_SAMPLE_VARINT: usize = 5;

// Envelope header plus status, message and channel list fields.
const REPLY_OVERHEAD: usize = 1024;

/// A validated spy buffer acquisition request.
///
/// Channel order is significant: it fixes the channel-minor position of
/// every sample in the reply data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    channels: Vec<u32>,
    waveform_count: u32,
    samples_per_waveform: u32,
    software_trigger: bool,
}

impl AcquisitionRequest {
    /// Validate and build a request.
    ///
    /// Channels must be in `0..=39`, non-empty and distinct; both counts
    /// must be positive and the whole reply must be addressable in memory.
    pub fn new(channels: Vec<u32>, waveform_count: u32, samples_per_waveform: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(invalid("channel list is empty"));
        }
        for (idx, &channel) in channels.iter().enumerate() {
            if channel > MAX_CHANNEL_ID {
                return Err(invalid(format!(
                    "channel {channel} out of range 0..={MAX_CHANNEL_ID}"
                )));
            }
            if channels[..idx].contains(&channel) {
                return Err(invalid(format!("channel {channel} listed twice")));
            }
        }
        if waveform_count == 0 {
            return Err(invalid("waveform count must be at least 1"));
        }
        if samples_per_waveform == 0 {
            return Err(invalid("samples per waveform must be at least 1"));
        }

        let layout = Layout::new(channels.len(), samples_per_waveform as usize);
        layout
            .samples_in(waveform_count as usize)
            .and_then(|samples| samples.checked_mul(WIRE_BYTES_PER_SAMPLE))
            .ok_or_else(|| invalid("requested data size overflows"))?;

        Ok(Self {
            channels,
            waveform_count,
            samples_per_waveform,
            software_trigger: false,
        })
    }

    /// Ask the device to fire a software trigger before reading out.
    pub fn with_software_trigger(mut self, software_trigger: bool) -> Self {
        self.software_trigger = software_trigger;
        self
    }

    pub fn channels(&self) -> &[u32] {
        &self.channels
    }

    pub fn waveform_count(&self) -> u32 {
        self.waveform_count
    }

    pub fn samples_per_waveform(&self) -> u32 {
        self.samples_per_waveform
    }

    pub fn software_trigger(&self) -> bool {
        self.software_trigger
    }

    /// Layout of reply data for this request.
    pub fn layout(&self) -> Layout {
        Layout::new(self.channels.len(), self.samples_per_waveform as usize)
    }

    /// Samples in the complete reply. Cannot overflow once validated.
    pub fn total_samples(&self) -> usize {
        self.layout()
            .samples_in(self.waveform_count as usize)
            .unwrap_or(usize::MAX)
    }

    /// Upper bound on the encoded size of a reply carrying `waveforms`
    /// waveforms.
    pub fn reply_size_bound(&self, waveforms: u32) -> usize {
        self.layout()
            .samples_in(waveforms as usize)
            .unwrap_or(usize::MAX)
            .saturating_mul(MAX_SAMPLE_VARINT)
            .saturating_add(REPLY_OVERHEAD)
    }

    /// Single-shot request payload.
    pub fn to_legacy_message(&self) -> DumpSpyBuffersRequest {
        DumpSpyBuffersRequest {
            channel: self.channels[0],
            number_of_samples: self.samples_per_waveform,
            channel_list: self.channels.clone(),
            number_of_waveforms: self.waveform_count,
            software_trigger: self.software_trigger,
        }
    }

    /// Streaming request payload.
    pub fn to_chunk_message(&self, request_id: &RequestId, chunk_size: u32) -> DumpSpyBuffersChunkRequest {
        DumpSpyBuffersChunkRequest {
            request_id: request_id.as_str().to_string(),
            channel_list: self.channels.clone(),
            number_of_samples: self.samples_per_waveform,
            number_of_waveforms: self.waveform_count,
            software_trigger: self.software_trigger,
            chunk_size,
        }
    }
}

fn invalid(reason: impl Into<String>) -> AcquireError {
    AcquireError::InvalidRequest(reason.into())
}

/// Shape of reply data: waveform-major, channel-minor, sample-innermost.
///
/// Sample `s` of channel index `c` in waveform `w` sits at
/// `w * channels * samples_per_waveform + c * samples_per_waveform + s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub channels: usize,
    pub samples_per_waveform: usize,
}

impl Layout {
    pub fn new(channels: usize, samples_per_waveform: usize) -> Self {
        Self {
            channels,
            samples_per_waveform,
        }
    }

    /// Samples in one waveform across all channels.
    pub fn waveform_stride(&self) -> Option<usize> {
        self.channels.checked_mul(self.samples_per_waveform)
    }

    /// Samples in `waveforms` waveforms, or `None` on overflow.
    pub fn samples_in(&self, waveforms: usize) -> Option<usize> {
        self.waveform_stride()?.checked_mul(waveforms)
    }

    /// Flat index of `(waveform, channel_index, sample)`.
    pub fn index(&self, waveform: usize, channel_index: usize, sample: usize) -> usize {
        (waveform * self.channels + channel_index) * self.samples_per_waveform + sample
    }
}

/// Opaque token correlating streaming chunks with their request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh random (v4) UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn accepts_full_channel_range() {
        let request = AcquisitionRequest::new(vec![0, 39, 7], 10, 2048).unwrap();
        assert_eq!(request.channels(), &[0, 39, 7]);
        assert_eq!(request.total_samples(), 3 * 10 * 2048);
        assert!(!request.software_trigger());
    }

    #[test]
    fn rejects_invalid_requests() {
        let cases = [
            (vec![], 1, 1),
            (vec![40], 1, 1),
            (vec![1, 2, 1], 1, 1),
            (vec![1], 0, 1),
            (vec![1], 1, 0),
        ];
        for (channels, waveforms, samples) in cases {
            let err = AcquisitionRequest::new(channels.clone(), waveforms, samples).unwrap_err();
            assert!(
                matches!(err, AcquireError::InvalidRequest(_)),
                "{channels:?}/{waveforms}/{samples} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_unaddressable_reply() {
        let err = AcquisitionRequest::new((0..40).collect(), u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, AcquireError::InvalidRequest(_)));
    }

    #[test]
    fn reply_bound_covers_worst_case_varints() {
        let request = AcquisitionRequest::new(vec![0, 1], 3, 4).unwrap();
        assert_eq!(request.reply_size_bound(3), 2 * 3 * 4 * 5 + 1024);
        assert_eq!(request.reply_size_bound(1), 2 * 4 * 5 + 1024);

        // 40 x 2048 x 200 samples cannot fit a 64 MiB message.
        let large = AcquisitionRequest::new((0..40).collect(), 200, 2048).unwrap();
        assert!(large.reply_size_bound(200) > 64 * 1024 * 1024);
    }

    #[test]
    fn legacy_message_fills_single_channel_field() {
        let request = AcquisitionRequest::new(vec![5, 2], 3, 16)
            .unwrap()
            .with_software_trigger(true);
        let message = request.to_legacy_message();
        assert_eq!(message.channel, 5);
        assert_eq!(message.channel_list, vec![5, 2]);
        assert_eq!(message.number_of_waveforms, 3);
        assert_eq!(message.number_of_samples, 16);
        assert!(message.software_trigger);
    }

    #[test]
    fn chunk_message_carries_id_and_hint() {
        let request = AcquisitionRequest::new(vec![1], 20, 8).unwrap();
        let id = RequestId::from("abc");
        let message = request.to_chunk_message(&id, 5);
        assert_eq!(message.request_id, "abc");
        assert_eq!(message.chunk_size, 5);
    }

    #[test]
    fn layout_index_is_waveform_major() {
        let layout = Layout::new(2, 4);
        assert_eq!(layout.index(0, 0, 0), 0);
        assert_eq!(layout.index(0, 1, 0), 4);
        assert_eq!(layout.index(1, 0, 3), 11);
        assert_eq!(layout.samples_in(3), Some(24));
        assert_eq!(Layout::new(usize::MAX, 2).samples_in(1), None);
    }

    #[test]
    fn request_ids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| RequestId::generate()).collect();
        assert_eq!(ids.len(), 1000);

        let id = RequestId::generate();
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }
}
