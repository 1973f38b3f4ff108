//! Demultiplexing of interleaved reply data into per-channel samples.

use crate::request::Layout;

/// Raw data does not match the declared waveform count and layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReshapeError {
    #[error("data holds {actual} samples, layout needs {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("{waveforms} waveforms overflow the addressable sample count")]
    Overflow { waveforms: usize },
}

/// Narrow a wire sample to the persisted 16-bit resolution.
///
/// Keeps the low 16 bits; the device's samples never use more.
#[inline]
pub fn narrow(sample: u32) -> u16 {
    (sample & 0xFFFF) as u16
}

/// Split `data` into one slice per channel index.
///
/// `data` must hold exactly `waveforms` waveforms laid out per `layout`.
/// Each output slice is the concatenation of that channel's waveforms in
/// order, narrowed to `u16`.
pub fn reshape(
    data: &[u32],
    waveforms: usize,
    layout: &Layout,
) -> Result<Vec<Vec<u16>>, ReshapeError> {
    let expected = layout
        .samples_in(waveforms)
        .ok_or(ReshapeError::Overflow { waveforms })?;
    if data.len() != expected {
        return Err(ReshapeError::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }

    let per_channel = waveforms * layout.samples_per_waveform;
    let mut out: Vec<Vec<u16>> = (0..layout.channels)
        .map(|_| Vec::with_capacity(per_channel))
        .collect();

    if layout.samples_per_waveform == 0 {
        return Ok(out);
    }

    // Each block is one channel's waveform; blocks cycle through channels.
    for (block_idx, block) in data.chunks_exact(layout.samples_per_waveform).enumerate() {
        let channel_index = block_idx % layout.channels;
        out[channel_index].extend(block.iter().copied().map(narrow));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_channel_is_identity_after_narrowing() {
        let data: Vec<u32> = (0..32).map(|v| 0x0001_0000 | v).collect();
        let out = reshape(&data, 4, &Layout::new(1, 8)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], (0..32).collect::<Vec<u16>>());
    }

    #[test]
    fn strided_slices_per_channel() {
        let layout = Layout::new(3, 5);
        let waveforms = 4;
        let data: Vec<u32> = (0..layout.samples_in(waveforms).unwrap() as u32).collect();

        let out = reshape(&data, waveforms, &layout).unwrap();

        for (c, channel) in out.iter().enumerate() {
            assert_eq!(channel.len(), waveforms * layout.samples_per_waveform);
            for w in 0..waveforms {
                for s in 0..layout.samples_per_waveform {
                    let got = channel[w * layout.samples_per_waveform + s];
                    assert_eq!(u32::from(got), data[layout.index(w, c, s)]);
                }
            }
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = reshape(&[1, 2, 3], 1, &Layout::new(2, 2)).unwrap_err();
        assert_eq!(
            err,
            ReshapeError::LengthMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn overflow_is_rejected() {
        let err = reshape(&[], usize::MAX, &Layout::new(2, 2)).unwrap_err();
        assert_eq!(err, ReshapeError::Overflow { waveforms: usize::MAX });
    }

    #[test]
    fn zero_waveforms_give_empty_channels() {
        let out = reshape(&[], 0, &Layout::new(2, 8)).unwrap();
        assert_eq!(out, vec![Vec::<u16>::new(), Vec::new()]);
    }

    #[test]
    fn narrowing_keeps_low_bits() {
        assert_eq!(narrow(0xDEAD_BEEF), 0xBEEF);
        assert_eq!(narrow(0x3FFF), 0x3FFF);
    }
}
