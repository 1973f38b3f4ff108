//! Spy buffer acquisition over a device link.
//!
//! An [`AcquisitionEngine`] drives one request at a time over any
//! [`MessageChannel`](spybuf_link::MessageChannel), in legacy (one reply)
//! or streaming (chunked, credit-bounded) mode, and demultiplexes the
//! samples into one [`SampleSink`] per channel.
//!
//! ```no_run
//! use spybuf_acquire::{AcquisitionConfig, AcquisitionEngine, AcquisitionRequest, FileSinks};
//!
//! let mut link = spybuf_link::connect("tcp://10.73.137.104:9000", "daq-1")?;
//! let request = AcquisitionRequest::new(vec![0, 1, 2, 3], 100, 2048)?;
//! let mut sinks = FileSinks::new("runs/latest");
//! let acquisition = AcquisitionEngine::new(&mut link, AcquisitionConfig::default())
//!     .acquire(&request, &mut sinks)?;
//! println!("{} waveforms", acquisition.summary.waveforms_written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod command;
pub mod credit;
pub mod engine;
pub mod error;
pub mod reassembler;
pub mod request;
pub mod reshape;
pub mod simulator;
pub mod sink;

pub use cancel::CancelToken;
pub use command::{execute, software_trigger};
pub use credit::{compute_credit, CreditConfig};
pub use engine::{
    Acquisition, AcquisitionConfig, AcquisitionEngine, AcquisitionSummary, Completion, Mode,
    DEFAULT_CHUNK_HINT, DEFAULT_REPLY_TIMEOUT,
};
pub use error::{AcquireError, Result};
pub use reassembler::Reassembler;
pub use request::{AcquisitionRequest, Layout, RequestId, MAX_CHANNEL_ID, WIRE_BYTES_PER_SAMPLE};
pub use reshape::{narrow, reshape, ReshapeError};
pub use simulator::{synthetic_block, synthetic_sample, SessionStats, Simulator, SimulatorConfig};
pub use sink::{
    mean_waveform, read_waveforms, FileSink, FileSinks, SampleSink, SinkFactory, DEFAULT_EXTENSION,
};
