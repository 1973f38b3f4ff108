//! Acquisition protocol engine.
//!
//! Legacy mode sends one `DUMP_SPYBUFFER` request and expects exactly one
//! reply of the same type. Streaming mode sends `DUMP_SPYBUFFER_CHUNK`
//! after sizing the inbound credit, then consumes chunk replies until one
//! is marked final.
//!
//! The two modes treat stray messages differently on purpose. A legacy
//! exchange has a single expected reply, so any other type is fatal. A
//! streaming exchange shares the link with unrelated traffic, so other
//! types and chunks from earlier requests are discarded.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use spybuf_link::{LinkConfig, LinkError, MessageChannel};
use spybuf_proto::{
    decode, encode_message, DumpSpyBuffersChunkResponse, DumpSpyBuffersResponse, MessageType,
    ProtoError,
};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::credit::{compute_credit, CreditConfig};
use crate::error::{AcquireError, Result};
use crate::reassembler::Reassembler;
use crate::request::{AcquisitionRequest, Layout, RequestId};
use crate::sink::{SampleSink, SinkFactory};

/// Default waveforms per streaming chunk.
pub const DEFAULT_CHUNK_HINT: u32 = 5;

/// Default bound on the wait for each reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

// Longest single wait before the cancel flag is checked again.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One request, one reply carrying every waveform.
    Legacy,
    /// One request, a flow-controlled sequence of chunk replies.
    Streaming,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Legacy => "legacy",
            Mode::Streaming => "streaming",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub mode: Mode,
    /// Requested waveforms per chunk (streaming only).
    pub chunk_hint: u32,
    pub credit: CreditConfig,
    /// Bound on the wait for each reply or chunk.
    pub reply_timeout: Duration,
    /// Largest message the link accepts. Requests whose replies could
    /// exceed it are refused before anything is sent.
    pub max_message_bytes: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Streaming,
            chunk_hint: DEFAULT_CHUNK_HINT,
            credit: CreditConfig::default(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            max_message_bytes: LinkConfig::default().max_payload_size,
        }
    }
}

impl AcquisitionConfig {
    /// Waveforms per chunk actually requested for `request`.
    pub fn chunk_hint_for(&self, request: &AcquisitionRequest) -> u32 {
        self.chunk_hint.min(request.waveform_count()).max(1)
    }

    /// Refuse `request` if its largest reply could exceed the message limit.
    pub fn check_request(&self, request: &AcquisitionRequest) -> Result<()> {
        let (waveforms, advice) = match self.mode {
            Mode::Legacy => (request.waveform_count(), "use streaming mode"),
            Mode::Streaming => (self.chunk_hint_for(request), "use a smaller chunk size"),
        };
        let bound = request.reply_size_bound(waveforms);
        if bound > self.max_message_bytes {
            return Err(AcquireError::InvalidRequest(format!(
                "{} reply may reach {bound} bytes, above the {} byte message limit; {advice}",
                self.mode, self.max_message_bytes
            )));
        }
        Ok(())
    }
}

/// How a successful acquisition ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every requested waveform was written.
    Complete,
    /// The device marked the stream final early.
    PartialDelivery { expected: u64, received: u64 },
}

/// Outcome of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSummary {
    pub mode: Mode,
    /// Streaming request id.
    pub request_id: Option<String>,
    pub channels: Vec<u32>,
    pub samples_per_waveform: u32,
    pub expected_waveforms: u64,
    pub waveforms_written: u64,
    /// Replies appended (1 in legacy mode).
    pub chunks: u64,
    /// Unrelated messages and stale chunks dropped while streaming.
    pub discarded: u64,
    /// Inbound capacity applied (streaming only).
    pub credit: Option<usize>,
    pub completion: Completion,
}

impl AcquisitionSummary {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}

/// A finished acquisition: its summary and the finished sinks.
#[derive(Debug)]
pub struct Acquisition<S> {
    pub summary: AcquisitionSummary,
    pub sinks: Vec<(u32, S)>,
}

/// Drives acquisitions over one channel, one at a time.
pub struct AcquisitionEngine<'c, C: MessageChannel> {
    channel: &'c mut C,
    config: AcquisitionConfig,
    cancel: CancelToken,
}

impl<'c, C: MessageChannel> AcquisitionEngine<'c, C> {
    pub fn new(channel: &'c mut C, config: AcquisitionConfig) -> Self {
        Self {
            channel,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Observe `cancel` before every blocking step.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Run one acquisition, writing each channel through `factory`.
    ///
    /// Sinks are opened before the request is sent and finished on every
    /// exit path. Sinks that defer creating their output until the first
    /// append leave nothing behind when the exchange fails.
    pub fn acquire<F: SinkFactory>(
        &mut self,
        request: &AcquisitionRequest,
        factory: &mut F,
    ) -> Result<Acquisition<F::Sink>> {
        self.check_cancel()?;
        self.config.check_request(request)?;

        let mut reassembler = Reassembler::open(
            request.channels(),
            request.samples_per_waveform() as usize,
            factory,
        )?;

        let outcome = match self.config.mode {
            Mode::Legacy => self.run_legacy(request, &mut reassembler),
            Mode::Streaming => self.run_streaming(request, &mut reassembler),
        };

        match outcome {
            Ok(summary) => {
                let sinks = reassembler.close()?;
                match &summary.completion {
                    Completion::Complete => info!(
                        mode = %summary.mode,
                        waveforms = summary.waveforms_written,
                        chunks = summary.chunks,
                        "acquisition complete"
                    ),
                    Completion::PartialDelivery { expected, received } => warn!(
                        mode = %summary.mode,
                        expected,
                        received,
                        "device ended the stream early"
                    ),
                }
                Ok(Acquisition { summary, sinks })
            }
            Err(err) => {
                if let Err(close_err) = reassembler.close() {
                    warn!(error = %close_err, "closing sinks after failure also failed");
                }
                Err(err)
            }
        }
    }

    fn run_legacy<S: SampleSink>(
        &mut self,
        request: &AcquisitionRequest,
        reassembler: &mut Reassembler<S>,
    ) -> Result<AcquisitionSummary> {
        let wire = encode_message(MessageType::DumpSpybuffer, &request.to_legacy_message());
        self.check_cancel()?;
        self.channel.send_one(&wire).map_err(AcquireError::Send)?;
        info!(
            channels = ?request.channels(),
            waveforms = request.waveform_count(),
            samples = request.samples_per_waveform(),
            "legacy dump requested"
        );

        let bytes = self.next_message()?;
        let envelope =
            decode(&bytes).map_err(|err| AcquireError::decode_reply(err, MessageType::DumpSpybuffer))?;
        if envelope.kind != MessageType::DumpSpybuffer {
            return Err(AcquireError::UnexpectedMessageType {
                expected: MessageType::DumpSpybuffer,
                actual: envelope.kind.to_string(),
            });
        }

        let reply: DumpSpyBuffersResponse = envelope.payload_as()?;
        if !reply.success {
            return Err(AcquireError::ServerReportedFailure {
                message: reply.message,
            });
        }

        let expected = request.total_samples() as u64;
        if reply.data.len() as u64 != expected {
            return Err(AcquireError::SizeMismatch {
                what: "reply sample count",
                expected,
                actual: reply.data.len() as u64,
            });
        }

        reassembler.append(request.waveform_count() as usize, &reply.data)?;

        Ok(AcquisitionSummary {
            mode: Mode::Legacy,
            request_id: None,
            channels: request.channels().to_vec(),
            samples_per_waveform: request.samples_per_waveform(),
            expected_waveforms: u64::from(request.waveform_count()),
            waveforms_written: reassembler.waveforms(),
            chunks: 1,
            discarded: 0,
            credit: None,
            completion: Completion::Complete,
        })
    }

    fn run_streaming<S: SampleSink>(
        &mut self,
        request: &AcquisitionRequest,
        reassembler: &mut Reassembler<S>,
    ) -> Result<AcquisitionSummary> {
        let request_id = RequestId::generate();
        let chunk_hint = self.config.chunk_hint_for(request);
        let credit = compute_credit(
            request.samples_per_waveform() as usize,
            chunk_hint as usize,
            request.channels().len(),
            &self.config.credit,
        );

        let wire = encode_message(
            MessageType::DumpSpybufferChunk,
            &request.to_chunk_message(&request_id, chunk_hint),
        );

        self.check_cancel()?;
        self.channel.set_inbound_capacity(credit);
        self.channel.send_one(&wire).map_err(AcquireError::Send)?;
        info!(
            request_id = %request_id,
            channels = ?request.channels(),
            waveforms = request.waveform_count(),
            samples = request.samples_per_waveform(),
            chunk_hint,
            credit,
            "streaming dump requested"
        );

        let mut stream = StreamState {
            request_id,
            layout: request.layout(),
            chunk_hint: u64::from(chunk_hint),
            expected: u64::from(request.waveform_count()),
            received: 0,
            chunks: 0,
            discarded: 0,
        };

        let reply_timeout = self.config.reply_timeout;
        let mut quiet_since = Instant::now();
        'receive: loop {
            let poll = reply_timeout.min(CANCEL_POLL);
            for item in self.channel.receive_stream(Some(poll)) {
                match item {
                    Ok(bytes) => match stream.accept(&bytes, reassembler)? {
                        Step::Final => break 'receive,
                        Step::Appended => quiet_since = Instant::now(),
                        Step::Discarded => {
                            if quiet_since.elapsed() >= reply_timeout {
                                return Err(AcquireError::Timeout(reply_timeout));
                            }
                        }
                    },
                    Err(LinkError::Timeout(_)) => {
                        if quiet_since.elapsed() >= reply_timeout {
                            return Err(AcquireError::Timeout(reply_timeout));
                        }
                    }
                    Err(err) => return Err(AcquireError::receive(err)),
                }
                if self.cancel.is_cancelled() {
                    return Err(AcquireError::Cancelled);
                }
            }
        }

        let completion = if stream.received < stream.expected {
            Completion::PartialDelivery {
                expected: stream.expected,
                received: stream.received,
            }
        } else {
            Completion::Complete
        };

        Ok(AcquisitionSummary {
            mode: Mode::Streaming,
            request_id: Some(stream.request_id.as_str().to_string()),
            channels: request.channels().to_vec(),
            samples_per_waveform: request.samples_per_waveform(),
            expected_waveforms: stream.expected,
            waveforms_written: stream.received,
            chunks: stream.chunks,
            discarded: stream.discarded,
            credit: Some(credit),
            completion,
        })
    }

    /// Wait for one message, in slices short enough to notice cancellation.
    fn next_message(&mut self) -> Result<Bytes> {
        let started = Instant::now();
        loop {
            self.check_cancel()?;
            let remaining = self.config.reply_timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(AcquireError::Timeout(self.config.reply_timeout));
            }
            match self.channel.receive_one(Some(remaining.min(CANCEL_POLL))) {
                Ok(bytes) => return Ok(bytes),
                Err(LinkError::Timeout(_)) => continue,
                Err(err) => return Err(AcquireError::receive(err)),
            }
        }
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Appended,
    /// Not part of this request; does not count as progress.
    Discarded,
    Final,
}

struct StreamState {
    request_id: RequestId,
    layout: Layout,
    chunk_hint: u64,
    expected: u64,
    received: u64,
    chunks: u64,
    discarded: u64,
}

impl StreamState {
    fn accept<S: SampleSink>(&mut self, bytes: &[u8], reassembler: &mut Reassembler<S>) -> Result<Step> {
        let envelope = match decode(bytes) {
            Ok(envelope) => envelope,
            Err(ProtoError::UnknownMessageType(value)) => {
                self.discarded += 1;
                warn!(request_id = %self.request_id, msg_type = value, "discarding message of unknown type");
                return Ok(Step::Discarded);
            }
            Err(err) => return Err(err.into()),
        };

        if envelope.kind != MessageType::DumpSpybufferChunkResponse {
            self.discarded += 1;
            warn!(request_id = %self.request_id, msg_type = %envelope.kind, "discarding unrelated message");
            return Ok(Step::Discarded);
        }

        let chunk: DumpSpyBuffersChunkResponse = envelope.payload_as()?;
        if chunk.request_id != self.request_id.as_str() {
            self.discarded += 1;
            warn!(
                request_id = %self.request_id,
                stale_id = %chunk.request_id,
                "discarding chunk from another request"
            );
            return Ok(Step::Discarded);
        }

        if !chunk.success {
            return Err(AcquireError::ServerReportedFailure {
                message: chunk.message,
            });
        }

        let waveforms = u64::from(chunk.waveform_count);
        if waveforms > self.chunk_hint {
            return Err(AcquireError::SizeMismatch {
                what: "chunk waveform count above hint",
                expected: self.chunk_hint,
                actual: waveforms,
            });
        }
        if self.received + waveforms > self.expected {
            return Err(AcquireError::SizeMismatch {
                what: "waveforms beyond request",
                expected: self.expected,
                actual: self.received + waveforms,
            });
        }
        let expected_samples = self
            .layout
            .samples_in(chunk.waveform_count as usize)
            .map_or(u64::MAX, |n| n as u64);
        if chunk.data.len() as u64 != expected_samples {
            return Err(AcquireError::SizeMismatch {
                what: "chunk sample count",
                expected: expected_samples,
                actual: chunk.data.len() as u64,
            });
        }

        reassembler.append(chunk.waveform_count as usize, &chunk.data)?;
        self.received += waveforms;
        self.chunks += 1;
        debug!(
            request_id = %self.request_id,
            waveforms,
            received = self.received,
            is_final = chunk.is_final,
            "chunk appended"
        );

        Ok(if chunk.is_final { Step::Final } else { Step::Appended })
    }
}
