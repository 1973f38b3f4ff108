//! Inbound credit sizing.
//!
//! The link buffers at most `credit` undelivered chunks, so in-flight chunk
//! memory stays near `credit * chunk_bytes`, roughly the configured budget,
//! whatever the device's send rate.

/// Memory budget and bounds for the inbound credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditConfig {
    /// Bytes the caller is willing to hold in undelivered chunks.
    pub memory_budget_bytes: u64,
    pub min_credit: usize,
    pub max_credit: usize,
    /// Wire width of one sample.
    pub bytes_per_sample: usize,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: 128 * 1024 * 1024,
            min_credit: 1,
            max_credit: 1024,
            bytes_per_sample: crate::request::WIRE_BYTES_PER_SAMPLE,
        }
    }
}

impl CreditConfig {
    /// Bytes in one chunk of `chunk_waveforms` waveforms. Never zero.
    pub fn chunk_bytes(
        &self,
        samples_per_waveform: usize,
        chunk_waveforms: usize,
        channel_count: usize,
    ) -> u128 {
        (samples_per_waveform as u128)
            .saturating_mul(chunk_waveforms as u128)
            .saturating_mul(channel_count as u128)
            .saturating_mul(self.bytes_per_sample as u128)
            .max(1)
    }
}

/// Inbound queue capacity, in messages, for chunks of the given shape.
///
/// `floor(budget / chunk_bytes)` clamped into `[min_credit, max_credit]`.
/// When the bounds are inverted `max_credit` wins.
pub fn compute_credit(
    samples_per_waveform: usize,
    chunk_waveforms: usize,
    channel_count: usize,
    config: &CreditConfig,
) -> usize {
    let chunk_bytes = config.chunk_bytes(samples_per_waveform, chunk_waveforms, channel_count);
    let credit = u128::from(config.memory_budget_bytes) / chunk_bytes;
    let credit = usize::try_from(credit).unwrap_or(usize::MAX);
    credit.max(config.min_credit).min(config.max_credit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_for_four_channels() {
        let config = CreditConfig::default();
        assert_eq!(config.chunk_bytes(2048, 5, 4), 163_840);
        assert_eq!(compute_credit(2048, 5, 4, &config), 819);
    }

    #[test]
    fn clamps_to_bounds() {
        let config = CreditConfig::default();
        // Tiny chunks would allow millions of messages.
        assert_eq!(compute_credit(1, 1, 1, &config), 1024);
        // One chunk bigger than the whole budget still gets one slot.
        assert_eq!(compute_credit(1 << 20, 64, 40, &config), 1);
    }

    #[test]
    fn zero_sized_chunk_counts_as_one_byte() {
        let config = CreditConfig {
            memory_budget_bytes: 10,
            max_credit: 100,
            ..CreditConfig::default()
        };
        assert_eq!(config.chunk_bytes(0, 5, 4), 1);
        assert_eq!(compute_credit(0, 5, 4, &config), 10);
    }

    #[test]
    fn monotonically_non_increasing() {
        let config = CreditConfig {
            memory_budget_bytes: 64 * 1024 * 1024,
            min_credit: 2,
            max_credit: 4096,
            ..CreditConfig::default()
        };
        for channels in 1..=8 {
            let mut previous = usize::MAX;
            for chunk in 1..=64 {
                let credit = compute_credit(1024, chunk, channels, &config);
                assert!(credit <= previous, "chunk={chunk} channels={channels}");
                assert!((config.min_credit..=config.max_credit).contains(&credit));
                previous = credit;
            }
        }
        for chunk in 1..=8 {
            let mut previous = usize::MAX;
            for channels in 1..=40 {
                let credit = compute_credit(1024, chunk, channels, &config);
                assert!(credit <= previous, "chunk={chunk} channels={channels}");
                previous = credit;
            }
        }
    }

    #[test]
    fn inverted_bounds_do_not_panic() {
        let config = CreditConfig {
            min_credit: 10,
            max_credit: 3,
            ..CreditConfig::default()
        };
        assert_eq!(compute_credit(8, 1, 1, &config), 3);
    }
}
