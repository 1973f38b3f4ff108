use tracing::{debug, warn};

use crate::error::{AcquireError, Result};
use crate::request::Layout;
use crate::reshape::reshape;
use crate::sink::{SampleSink, SinkFactory};

/// Demultiplexes ordered sample batches into one sink per channel.
///
/// Every channel's sink receives a gapless concatenation of its waveforms
/// in arrival order. Sinks are finished exactly once: by [`close`], or on
/// drop if the reassembler is abandoned.
///
/// [`close`]: Reassembler::close
pub struct Reassembler<S: SampleSink> {
    channels: Vec<u32>,
    layout: Layout,
    sinks: Vec<S>,
    waveforms: u64,
    finished: bool,
}

impl<S: SampleSink> Reassembler<S> {
    /// Open one sink per channel, in channel-list order.
    pub fn open<F>(channels: &[u32], samples_per_waveform: usize, factory: &mut F) -> Result<Self>
    where
        F: SinkFactory<Sink = S>,
    {
        let mut sinks = Vec::with_capacity(channels.len());
        for &channel in channels {
            let sink = factory
                .open(channel)
                .map_err(|source| AcquireError::Sink { channel, source })?;
            sinks.push(sink);
        }
        debug!(channels = ?channels, "reassembly opened");

        Ok(Self {
            channels: channels.to_vec(),
            layout: Layout::new(channels.len(), samples_per_waveform),
            sinks,
            waveforms: 0,
            finished: false,
        })
    }

    /// Append one batch of `waveforms` waveforms.
    ///
    /// The batch is reshaped before any sink is touched, so a malformed
    /// batch leaves every sink unchanged.
    pub fn append(&mut self, waveforms: usize, data: &[u32]) -> Result<()> {
        let per_channel = reshape(data, waveforms, &self.layout)?;
        for ((sink, &channel), samples) in self.sinks.iter_mut().zip(&self.channels).zip(per_channel) {
            sink.write_samples(&samples)
                .map_err(|source| AcquireError::Sink { channel, source })?;
        }
        self.waveforms += waveforms as u64;
        Ok(())
    }

    /// Waveforms appended so far.
    pub fn waveforms(&self) -> u64 {
        self.waveforms
    }

    pub fn channels(&self) -> &[u32] {
        &self.channels
    }

    /// Finish every sink and hand them back, keyed by channel.
    ///
    /// All sinks are finished even if one fails; the first failure is
    /// reported.
    pub fn close(mut self) -> Result<Vec<(u32, S)>> {
        self.finished = true;
        let sinks = std::mem::take(&mut self.sinks);
        let mut first_err = None;
        let mut out = Vec::with_capacity(sinks.len());

        for (mut sink, &channel) in sinks.into_iter().zip(&self.channels) {
            if let Err(source) = sink.finish() {
                if first_err.is_none() {
                    first_err = Some(AcquireError::Sink { channel, source });
                }
            }
            out.push((channel, sink));
        }
        debug!(waveforms = self.waveforms, "reassembly closed");

        match first_err {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }
}

impl<S: SampleSink> Drop for Reassembler<S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        for (sink, channel) in self.sinks.iter_mut().zip(&self.channels) {
            if let Err(err) = sink.finish() {
                warn!(channel, error = %err, "failed to finish abandoned sink");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    use super::*;
    use crate::reshape::ReshapeError;

    fn memory() -> impl FnMut(u32) -> io::Result<Vec<u16>> {
        |_| Ok(Vec::new())
    }

    #[test]
    fn single_channel_batch() {
        let mut reassembler = Reassembler::open(&[3], 8, &mut memory()).unwrap();
        let data: Vec<u32> = (0..32).map(|v| 0xABCD_0000 | v).collect();

        reassembler.append(4, &data).unwrap();
        assert_eq!(reassembler.waveforms(), 4);

        let sinks = reassembler.close().unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].0, 3);
        assert_eq!(sinks[0].1, (0..32).collect::<Vec<u16>>());
    }

    #[test]
    fn batches_concatenate_per_channel() {
        let mut reassembler = Reassembler::open(&[0, 1], 4, &mut memory()).unwrap();
        reassembler.append(1, &[10, 11, 12, 13, 20, 21, 22, 23]).unwrap();
        reassembler.append(1, &[14, 15, 16, 17, 24, 25, 26, 27]).unwrap();

        let sinks = reassembler.close().unwrap();
        assert_eq!(sinks[0], (0, vec![10, 11, 12, 13, 14, 15, 16, 17]));
        assert_eq!(sinks[1], (1, vec![20, 21, 22, 23, 24, 25, 26, 27]));
    }

    #[test]
    fn bad_batch_leaves_sinks_untouched() {
        let mut reassembler = Reassembler::open(&[0, 1], 2, &mut memory()).unwrap();
        reassembler.append(1, &[1, 2, 3, 4]).unwrap();

        let err = reassembler.append(1, &[5, 6, 7]).unwrap_err();
        assert!(matches!(
            err,
            AcquireError::Reshape(ReshapeError::LengthMismatch { expected: 4, actual: 3 })
        ));

        let sinks = reassembler.close().unwrap();
        assert_eq!(sinks[0].1, vec![1, 2]);
        assert_eq!(sinks[1].1, vec![3, 4]);
    }

    #[derive(Debug)]
    struct Tracked {
        finished: Rc<RefCell<Vec<u32>>>,
        channel: u32,
        fail_finish: bool,
    }

    impl SampleSink for Tracked {
        fn write_samples(&mut self, _samples: &[u16]) -> io::Result<()> {
            Ok(())
        }

        fn finish(&mut self) -> io::Result<()> {
            self.finished.borrow_mut().push(self.channel);
            if self.fail_finish {
                return Err(io::Error::other("disk full"));
            }
            Ok(())
        }
    }

    #[test]
    fn drop_finishes_abandoned_sinks_once() {
        let finished = Rc::new(RefCell::new(Vec::new()));
        let mut factory = |channel: u32| -> io::Result<Tracked> {
            Ok(Tracked {
                finished: Rc::clone(&finished),
                channel,
                fail_finish: false,
            })
        };

        let reassembler = Reassembler::open(&[4, 2], 1, &mut factory).unwrap();
        drop(reassembler);
        assert_eq!(*finished.borrow(), vec![4, 2]);

        let reassembler = Reassembler::open(&[7], 1, &mut factory).unwrap();
        reassembler.close().unwrap();
        assert_eq!(*finished.borrow(), vec![4, 2, 7]);
    }

    #[test]
    fn close_finishes_all_and_reports_first_failure() {
        let finished = Rc::new(RefCell::new(Vec::new()));
        let mut factory = |channel: u32| -> io::Result<Tracked> {
            Ok(Tracked {
                finished: Rc::clone(&finished),
                channel,
                fail_finish: channel == 1,
            })
        };

        let reassembler = Reassembler::open(&[0, 1, 2], 1, &mut factory).unwrap();
        let err = reassembler.close().unwrap_err();
        assert!(matches!(err, AcquireError::Sink { channel: 1, .. }));
        assert_eq!(*finished.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn open_failure_names_channel() {
        let mut factory = |channel: u32| -> io::Result<Vec<u16>> {
            if channel == 5 {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            } else {
                Ok(Vec::new())
            }
        };
        let err = Reassembler::open(&[1, 5], 4, &mut factory).err().unwrap();
        assert!(matches!(err, AcquireError::Sink { channel: 5, .. }));
    }
}
