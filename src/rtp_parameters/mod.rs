#[cfg(test)]
mod rtp_parameters_test;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Media kind of a codec, track or producer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Value of a codec-specific parameter. Signaling peers send numbers,
/// strings and the occasional boolean; everything else is rejected upstream.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CodecParameterValue {
    Number(u32),
    String(String),
    Bool(bool),
}

impl CodecParameterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CodecParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            CodecParameterValue::Number(n) => Some(*n),
            CodecParameterValue::String(s) => s.parse().ok(),
            CodecParameterValue::Bool(_) => None,
        }
    }
}

impl From<u32> for CodecParameterValue {
    fn from(n: u32) -> Self {
        CodecParameterValue::Number(n)
    }
}

impl From<&str> for CodecParameterValue {
    fn from(s: &str) -> Self {
        CodecParameterValue::String(s.to_owned())
    }
}

/// Codec specific parameters. Some entries (such as `packetization-mode` and
/// `profile-level-id` in H264 or `profile-id` in VP9) are critical for codec
/// matching.
pub type CodecParameters = BTreeMap<String, CodecParameterValue>;

/// Transport layer or codec-specific feedback message supported by a codec.
#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct RtcpFeedback {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub parameter: String,
}

impl RtcpFeedback {
    pub fn new(typ: &str, parameter: &str) -> Self {
        Self {
            typ: typ.to_owned(),
            parameter: parameter.to_owned(),
        }
    }
}

/// Capability of a single codec as advertised by a peer or device.
/// https://mediasoup.org/documentation/v3/mediasoup/rtp-parameters-and-capabilities/
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub kind: MediaKind,
    /// The codec MIME media type/subtype (e.g. "audio/opus", "video/VP8").
    /// Matching is case insensitive.
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    pub clock_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: CodecParameters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecCapability {
    /// Whether this is a retransmission codec, paired with a primary codec
    /// through its `apt` parameter.
    pub fn is_rtx(&self) -> bool {
        self.mime_type.to_lowercase().ends_with("/rtx")
    }

    /// The associated payload type of an RTX codec, if any.
    pub fn apt(&self) -> Option<u32> {
        self.parameters.get("apt").and_then(|v| v.as_u32())
    }
}

/// Direction in which an RTP header extension may be used.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RtpHeaderExtensionDirection {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Default for RtpHeaderExtensionDirection {
    fn default() -> Self {
        Self::SendRecv
    }
}

/// RFC 5285 RTP header extension supported by a peer or device.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    /// Media kind this extension applies to; `None` means any kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    pub uri: String,
    pub preferred_id: u16,
    #[serde(default)]
    pub preferred_encrypt: bool,
    #[serde(default)]
    pub direction: RtpHeaderExtensionDirection,
}

/// What a peer or device can encode or decode. Immutable value; a new one is
/// produced per renegotiation.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    pub codecs: Vec<RtpCodecCapability>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
}

/// A codec that matched on both sides of the capability exchange, carrying
/// both the local and the remote identifiers. Every entry has a remote
/// payload type by construction; remote codecs without a resolvable local
/// match are dropped during the exchange.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpCodec {
    pub kind: MediaKind,
    pub mime_type: String,
    pub clock_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    pub local_payload_type: u8,
    pub remote_payload_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_rtx_payload_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_rtx_payload_type: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub local_parameters: CodecParameters,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remote_parameters: CodecParameters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

/// A header extension that matched on both sides, with the send and receive
/// ids it negotiates to and the direction seen from the local perspective.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpHeaderExtension {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    pub uri: String,
    pub send_id: u16,
    pub recv_id: u16,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub direction: RtpHeaderExtensionDirection,
}

/// Session-scoped pairing of local and remote capabilities, computed once per
/// device-load/capability-exchange and read-only afterward.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpCapabilities {
    pub codecs: Vec<ExtendedRtpCodec>,
    #[serde(default)]
    pub header_extensions: Vec<ExtendedRtpHeaderExtension>,
}

/// A codec bound to a concrete payload type, as sent to produce()/consume().
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    pub mime_type: String,
    pub payload_type: u8,
    pub clock_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: CodecParameters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecParameters {
    pub fn is_rtx(&self) -> bool {
        self.mime_type.to_lowercase().ends_with("/rtx")
    }
}

/// A header extension bound to a concrete id.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtensionParameters {
    pub uri: String,
    pub id: u16,
    #[serde(default)]
    pub encrypt: bool,
}

/// RTX stream information for an encoding.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct RtpEncodingRtx {
    pub ssrc: u32,
}

fn default_active() -> bool {
    true
}

/// One transmitted RTP stream and its settings. Optional fields are never
/// serialized as explicit nulls: an explicit null in this signaling path
/// breaks SFU routing for rid-based simulcast.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_payload_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtx: Option<RtpEncodingRtx>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtx: Option<bool>,
    /// Must be true for the remote SFU to forward this encoding.
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_framerate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_resolution_down_by: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
}

impl Default for RtpEncodingParameters {
    fn default() -> Self {
        Self {
            ssrc: None,
            rid: None,
            codec_payload_type: None,
            rtx: None,
            dtx: None,
            active: true,
            max_bitrate: None,
            min_bitrate: None,
            max_framerate: None,
            scale_resolution_down_by: None,
            scalability_mode: None,
        }
    }
}

/// RTCP settings within the RTP parameters.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    pub reduced_size: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<bool>,
}

impl Default for RtcpParameters {
    fn default() -> Self {
        Self {
            cname: None,
            reduced_size: true,
            mux: None,
        }
    }
}

/// Concrete, payload-type-bound parameters passed to produce()/consume().
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    pub codecs: Vec<RtpCodecParameters>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtensionParameters>,
    #[serde(default)]
    pub encodings: Vec<RtpEncodingParameters>,
    #[serde(default)]
    pub rtcp: RtcpParameters,
}
