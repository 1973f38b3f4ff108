//! Spy buffer dump payloads, single-shot and streaming.

use prost::Message;

/// Single-shot dump request (`DUMP_SPYBUFFER`).
#[derive(Clone, PartialEq, Message)]
pub struct DumpSpyBuffersRequest {
    /// Pre-list single channel field; carries the first channel.
    #[prost(uint32, tag = "1")]
    pub channel: u32,
    #[prost(uint32, tag = "2")]
    pub number_of_samples: u32,
    #[prost(uint32, repeated, tag = "3")]
    pub channel_list: Vec<u32>,
    #[prost(uint32, tag = "4")]
    pub number_of_waveforms: u32,
    #[prost(bool, tag = "5")]
    pub software_trigger: bool,
}

/// Single-shot dump reply.
///
/// `data` is laid out `[waveform][channel][sample]`, with channels in the
/// order of `channel_list`.
#[derive(Clone, PartialEq, Message)]
pub struct DumpSpyBuffersResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(uint32, repeated, tag = "3")]
    pub channel_list: Vec<u32>,
    #[prost(uint32, tag = "4")]
    pub number_of_samples: u32,
    #[prost(uint32, tag = "5")]
    pub number_of_waveforms: u32,
    #[prost(uint32, repeated, tag = "6")]
    pub data: Vec<u32>,
}

/// Streaming dump request (`DUMP_SPYBUFFER_CHUNK`).
#[derive(Clone, PartialEq, Message)]
pub struct DumpSpyBuffersChunkRequest {
    #[prost(string, tag = "1")]
    pub request_id: String,
    #[prost(uint32, repeated, tag = "2")]
    pub channel_list: Vec<u32>,
    #[prost(uint32, tag = "3")]
    pub number_of_samples: u32,
    #[prost(uint32, tag = "4")]
    pub number_of_waveforms: u32,
    #[prost(bool, tag = "5")]
    pub software_trigger: bool,
    /// Waveforms per chunk the server should aim for.
    #[prost(uint32, tag = "6")]
    pub chunk_size: u32,
}

/// One chunk of a streaming dump reply (`DUMP_SPYBUFFER_CHUNK_RESPONSE`).
///
/// `data` holds `waveform_count` waveforms in the same layout as
/// [`DumpSpyBuffersResponse::data`].
#[derive(Clone, PartialEq, Message)]
pub struct DumpSpyBuffersChunkResponse {
    #[prost(string, tag = "1")]
    pub request_id: String,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(uint32, tag = "4")]
    pub waveform_count: u32,
    #[prost(bool, tag = "5")]
    pub is_final: bool,
    #[prost(uint32, repeated, tag = "6")]
    pub data: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{decode, encode_message};
    use crate::message_type::MessageType;

    #[test]
    fn chunk_request_keeps_request_id_and_hint() {
        let request = DumpSpyBuffersChunkRequest {
            request_id: "42-1-99".to_string(),
            channel_list: vec![0, 7],
            number_of_samples: 16,
            number_of_waveforms: 10,
            software_trigger: true,
            chunk_size: 5,
        };
        let wire = encode_message(MessageType::DumpSpybufferChunk, &request);

        let envelope = decode(&wire).unwrap();
        assert_eq!(envelope.kind, MessageType::DumpSpybufferChunk);
        let back: DumpSpyBuffersChunkRequest = envelope.payload_as().unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn defaults_are_omitted_from_the_wire() {
        assert!(DumpSpyBuffersChunkResponse::default().encode_to_vec().is_empty());
    }

    #[test]
    fn legacy_request_fields_use_stable_tags() {
        let request = DumpSpyBuffersRequest {
            channel: 3,
            ..Default::default()
        };
        // field 1, varint
        assert_eq!(request.encode_to_vec(), vec![0x08, 0x03]);
    }
}
