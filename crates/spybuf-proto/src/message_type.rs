use std::fmt;

/// Closed enumeration of envelope types.
///
/// Values are the wire numbers of the `type` field. Device commands use
/// the same type for the request and its reply; the streaming dump has a
/// distinct reply type for its chunks. `TryFrom<i32>` rejects values
/// outside the enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    /// Default value of an unset field. Never valid on the wire.
    Unspecified = 0,
    ConfigureClks = 1,
    ConfigureFe = 2,
    WriteAfeReg = 3,
    WriteAfeVgain = 4,
    WriteAfeBiasSet = 5,
    WriteTrimAllCh = 6,
    WriteTrimAllAfe = 7,
    WriteTrimCh = 8,
    WriteOffsetAllCh = 9,
    WriteOffsetAllAfe = 10,
    WriteOffsetCh = 11,
    WriteVbiasControl = 12,
    ReadAfeReg = 13,
    ReadAfeVgain = 14,
    ReadAfeBiasSet = 15,
    ReadTrimAllCh = 16,
    ReadTrimAllAfe = 17,
    ReadTrimCh = 18,
    ReadOffsetAllCh = 19,
    ReadOffsetAllAfe = 20,
    ReadOffsetCh = 21,
    ReadVbiasControl = 22,
    ReadCurrentMonitor = 23,
    ReadBiasVoltageMonitor = 24,
    SetAfeReset = 25,
    DoAfeReset = 26,
    SetAfePowerstate = 27,
    /// Single-shot spy buffer dump; request and reply share this type.
    DumpSpybuffer = 28,
    AlignAfe = 29,
    WriteAfeFunction = 30,
    DoSoftwareTrigger = 31,
    /// Streaming spy buffer dump request.
    DumpSpybufferChunk = 32,
    /// One chunk of a streaming dump reply.
    DumpSpybufferChunkResponse = 33,
}

impl MessageType {
    /// The upper-snake-case protocol name (e.g. `DUMP_SPYBUFFER`).
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Unspecified => "UNSPECIFIED",
            MessageType::ConfigureClks => "CONFIGURE_CLKS",
            MessageType::ConfigureFe => "CONFIGURE_FE",
            MessageType::WriteAfeReg => "WRITE_AFE_REG",
            MessageType::WriteAfeVgain => "WRITE_AFE_VGAIN",
            MessageType::WriteAfeBiasSet => "WRITE_AFE_BIAS_SET",
            MessageType::WriteTrimAllCh => "WRITE_TRIM_ALL_CH",
            MessageType::WriteTrimAllAfe => "WRITE_TRIM_ALL_AFE",
            MessageType::WriteTrimCh => "WRITE_TRIM_CH",
            MessageType::WriteOffsetAllCh => "WRITE_OFFSET_ALL_CH",
            MessageType::WriteOffsetAllAfe => "WRITE_OFFSET_ALL_AFE",
            MessageType::WriteOffsetCh => "WRITE_OFFSET_CH",
            MessageType::WriteVbiasControl => "WRITE_VBIAS_CONTROL",
            MessageType::ReadAfeReg => "READ_AFE_REG",
            MessageType::ReadAfeVgain => "READ_AFE_VGAIN",
            MessageType::ReadAfeBiasSet => "READ_AFE_BIAS_SET",
            MessageType::ReadTrimAllCh => "READ_TRIM_ALL_CH",
            MessageType::ReadTrimAllAfe => "READ_TRIM_ALL_AFE",
            MessageType::ReadTrimCh => "READ_TRIM_CH",
            MessageType::ReadOffsetAllCh => "READ_OFFSET_ALL_CH",
            MessageType::ReadOffsetAllAfe => "READ_OFFSET_ALL_AFE",
            MessageType::ReadOffsetCh => "READ_OFFSET_CH",
            MessageType::ReadVbiasControl => "READ_VBIAS_CONTROL",
            MessageType::ReadCurrentMonitor => "READ_CURRENT_MONITOR",
            MessageType::ReadBiasVoltageMonitor => "READ_BIAS_VOLTAGE_MONITOR",
            MessageType::SetAfeReset => "SET_AFE_RESET",
            MessageType::DoAfeReset => "DO_AFE_RESET",
            MessageType::SetAfePowerstate => "SET_AFE_POWERSTATE",
            MessageType::DumpSpybuffer => "DUMP_SPYBUFFER",
            MessageType::AlignAfe => "ALIGN_AFE",
            MessageType::WriteAfeFunction => "WRITE_AFE_FUNCTION",
            MessageType::DoSoftwareTrigger => "DO_SOFTWARE_TRIGGER",
            MessageType::DumpSpybufferChunk => "DUMP_SPYBUFFER_CHUNK",
            MessageType::DumpSpybufferChunkResponse => "DUMP_SPYBUFFER_CHUNK_RESPONSE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
