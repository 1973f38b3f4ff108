//! In-process device stand-in for bench-less runs and loopback tests.
//!
//! Answers both dump forms with deterministic synthetic samples and
//! acknowledges every other command with `success = true`.

use std::net::SocketAddr;

use prost::Message;
use spybuf_link::{LinkError, LinkListener, ServerLink};
use spybuf_proto::{
    decode, encode_message, CommandResponse, DumpSpyBuffersChunkRequest,
    DumpSpyBuffersChunkResponse, DumpSpyBuffersRequest, DumpSpyBuffersResponse, MessageType,
};
use spybuf_transport::Endpoint;
use tracing::{debug, info, warn};

use crate::request::MAX_CHANNEL_ID;

/// Sample value for `(waveform, channel, sample)`.
///
/// The upper half-word is always set so readers can verify that only the
/// low 16 bits were kept.
pub fn synthetic_sample(waveform: u32, channel: u32, sample: u32) -> u32 {
    let low = waveform
        .wrapping_mul(131)
        .wrapping_add(channel.wrapping_mul(17))
        .wrapping_add(sample)
        & 0xFFFF;
    0xA5A5_0000 | low
}

/// Reply data for `waveforms` waveforms starting at `first_waveform`.
pub fn synthetic_block(channels: &[u32], first_waveform: u32, waveforms: u32, samples: u32) -> Vec<u32> {
    let mut data = Vec::with_capacity(channels.len() * waveforms as usize * samples as usize);
    for waveform in first_waveform..first_waveform + waveforms {
        for &channel in channels {
            data.extend((0..samples).map(|s| synthetic_sample(waveform, channel, s)));
        }
    }
    data
}

/// Simulator behaviour knobs.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    /// Stop streaming after this many waveforms, marking the last chunk final.
    pub deliver_limit: Option<u32>,
    /// Send an unrelated message ahead of every chunk.
    pub noise: bool,
    /// Refuse every dump with this message.
    pub fail_with: Option<String>,
}

/// Per-session counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: u64,
    pub chunks: u64,
    pub waveforms: u64,
}

pub struct Simulator {
    listener: LinkListener,
    config: SimulatorConfig,
}

impl Simulator {
    pub fn bind(addr: &str) -> Result<Self, LinkError> {
        Ok(Self {
            listener: LinkListener::bind(addr)?,
            config: SimulatorConfig::default(),
        })
    }

    pub fn with_config(mut self, config: SimulatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn endpoint(&self) -> Endpoint {
        self.listener.endpoint()
    }

    /// Serve clients one after another; `None` serves forever. A failed
    /// session is logged and does not stop the loop.
    pub fn serve(&self, max_sessions: Option<usize>) {
        let mut served = 0usize;
        while max_sessions.map_or(true, |max| served < max) {
            match self.serve_one() {
                Ok(stats) => info!(?stats, "session finished"),
                Err(err) => warn!(error = %err, "session ended abnormally"),
            }
            served += 1;
        }
    }

    /// Accept one client and answer it until it leaves.
    pub fn serve_one(&self) -> Result<SessionStats, LinkError> {
        let mut link = self.listener.accept()?;
        info!(identity = %link.identity(), session = %link.session(), "client connected");

        let mut stats = SessionStats::default();
        while let Some(bytes) = link.recv()? {
            let envelope = match decode(&bytes) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(error = %err, "ignoring undecodable request");
                    continue;
                }
            };
            stats.requests += 1;

            match envelope.kind {
                MessageType::DumpSpybuffer => {
                    match DumpSpyBuffersRequest::decode(envelope.payload.as_ref()) {
                        Ok(request) => self.answer_dump(&mut link, &request, &mut stats)?,
                        Err(err) => warn!(error = %err, "ignoring dump request"),
                    }
                }
                MessageType::DumpSpybufferChunk => {
                    match DumpSpyBuffersChunkRequest::decode(envelope.payload.as_ref()) {
                        Ok(request) => self.answer_chunked(&mut link, &request, &mut stats)?,
                        Err(err) => warn!(error = %err, "ignoring chunk request"),
                    }
                }
                other => {
                    debug!(msg_type = %other, "acknowledging command");
                    link.send(&encode_message(
                        other,
                        &CommandResponse {
                            success: true,
                            message: format!("{other} ok"),
                        },
                    ))?;
                }
            }
        }

        if let Err(err) = link.close() {
            debug!(error = %err, "session shutdown");
        }
        Ok(stats)
    }

    fn refusal(&self, channels: &[u32]) -> Option<String> {
        if let Some(message) = &self.config.fail_with {
            return Some(message.clone());
        }
        if channels.is_empty() {
            return Some("empty channel list".to_string());
        }
        channels
            .iter()
            .find(|&&ch| ch > MAX_CHANNEL_ID)
            .map(|ch| format!("invalid channel {ch}"))
    }

    fn answer_dump(
        &self,
        link: &mut ServerLink,
        request: &DumpSpyBuffersRequest,
        stats: &mut SessionStats,
    ) -> Result<(), LinkError> {
        let reply = match self.refusal(&request.channel_list) {
            Some(message) => DumpSpyBuffersResponse {
                success: false,
                message,
                ..Default::default()
            },
            None => DumpSpyBuffersResponse {
                success: true,
                message: String::new(),
                channel_list: request.channel_list.clone(),
                number_of_samples: request.number_of_samples,
                number_of_waveforms: request.number_of_waveforms,
                data: synthetic_block(
                    &request.channel_list,
                    0,
                    request.number_of_waveforms,
                    request.number_of_samples,
                ),
            },
        };
        if reply.success {
            stats.waveforms += u64::from(request.number_of_waveforms);
        }
        link.send(&encode_message(MessageType::DumpSpybuffer, &reply))
    }

    fn answer_chunked(
        &self,
        link: &mut ServerLink,
        request: &DumpSpyBuffersChunkRequest,
        stats: &mut SessionStats,
    ) -> Result<(), LinkError> {
        if let Some(message) = self.refusal(&request.channel_list) {
            let chunk = DumpSpyBuffersChunkResponse {
                request_id: request.request_id.clone(),
                success: false,
                message,
                is_final: true,
                ..Default::default()
            };
            return link.send(&encode_message(MessageType::DumpSpybufferChunkResponse, &chunk));
        }

        let total = self
            .config
            .deliver_limit
            .map_or(request.number_of_waveforms, |limit| limit.min(request.number_of_waveforms));
        let chunk_size = request.chunk_size.max(1);
        let mut sent = 0u32;

        loop {
            let waveforms = chunk_size.min(total - sent);
            let is_final = sent + waveforms >= total;

            if self.config.noise {
                link.send(&encode_message(
                    MessageType::ReadCurrentMonitor,
                    &CommandResponse {
                        success: true,
                        message: "unsolicited".to_string(),
                    },
                ))?;
            }

            let chunk = DumpSpyBuffersChunkResponse {
                request_id: request.request_id.clone(),
                success: true,
                message: String::new(),
                waveform_count: waveforms,
                is_final,
                data: synthetic_block(&request.channel_list, sent, waveforms, request.number_of_samples),
            };
            link.send(&encode_message(MessageType::DumpSpybufferChunkResponse, &chunk))?;
            stats.chunks += 1;
            stats.waveforms += u64::from(waveforms);
            sent += waveforms;

            if is_final {
                debug!(request_id = %request.request_id, waveforms = sent, "stream complete");
                return Ok(());
            }
        }
    }
}
