#[cfg(test)]
mod producer_test;

use std::collections::HashMap;

use serde_json::Value;

use crate::device::{MediaStream, MediaTrack};
use crate::rtp_parameters::{
    ExtendedRtpCapabilities, MediaKind, RtpCodecCapability, RtpEncodingParameters,
};

/// Where a producer's media comes from. Determines the fallback encoding
/// ladder and which session slot the producer occupies.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProducerSource {
    Microphone,
    Camera,
    Screen,
}

impl ProducerSource {
    pub fn kind(&self) -> MediaKind {
        match self {
            ProducerSource::Microphone => MediaKind::Audio,
            ProducerSource::Camera | ProducerSource::Screen => MediaKind::Video,
        }
    }
}

impl Default for ProducerSource {
    fn default() -> Self {
        ProducerSource::Camera
    }
}

/// Per-codec knobs passed through to produce().
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProducerCodecOptions {
    pub opus_stereo: Option<bool>,
    pub opus_fec: Option<bool>,
    pub opus_dtx: Option<bool>,
    pub opus_max_playback_rate: Option<u32>,
    pub video_google_start_bitrate: Option<u32>,
    pub video_google_max_bitrate: Option<u32>,
    pub video_google_min_bitrate: Option<u32>,
}

/// Everything needed to create a producer on a send transport.
#[derive(Default, Clone)]
pub struct ProducerOptions {
    pub track: Option<MediaTrack>,
    pub stream: Option<MediaStream>,
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<ProducerCodecOptions>,
    /// Preferred codec; overridden by the negotiated one during alignment.
    pub codec: Option<RtpCodecCapability>,
    pub app_data: HashMap<String, Value>,
    pub source: ProducerSource,
}

/// Picks the codec to produce with: the first negotiated codec of the given
/// kind, projected back to a plain capability under its local payload type.
pub fn select_codec(
    kind: MediaKind,
    extended: &ExtendedRtpCapabilities,
) -> Option<RtpCodecCapability> {
    extended
        .codecs
        .iter()
        .find(|codec| codec.kind == kind)
        .map(|codec| RtpCodecCapability {
            kind: codec.kind,
            mime_type: codec.mime_type.clone(),
            preferred_payload_type: Some(codec.local_payload_type),
            clock_rate: codec.clock_rate,
            channels: codec.channels,
            parameters: codec.local_parameters.clone(),
            rtcp_feedback: codec.rtcp_feedback.clone(),
        })
}

/// Encoding ladder used when the caller does not supply one.
///
/// Camera video gets a three-layer rid simulcast (quarter, half, full
/// resolution); screen share is a single high-bitrate layer with dtx;
/// microphone audio is a single 64 kbps layer.
pub fn fallback_encodings(source: ProducerSource) -> Vec<RtpEncodingParameters> {
    match source {
        ProducerSource::Camera => vec![
            RtpEncodingParameters {
                rid: Some("r0".to_owned()),
                max_bitrate: Some(200_000),
                scale_resolution_down_by: Some(4.0),
                scalability_mode: Some("L1T3".to_owned()),
                ..Default::default()
            },
            RtpEncodingParameters {
                rid: Some("r1".to_owned()),
                max_bitrate: Some(400_000),
                scale_resolution_down_by: Some(2.0),
                scalability_mode: Some("L1T3".to_owned()),
                ..Default::default()
            },
            RtpEncodingParameters {
                rid: Some("r2".to_owned()),
                max_bitrate: Some(800_000),
                scale_resolution_down_by: Some(1.0),
                scalability_mode: Some("L1T3".to_owned()),
                ..Default::default()
            },
        ],
        ProducerSource::Screen => vec![RtpEncodingParameters {
            dtx: Some(true),
            max_bitrate: Some(2_000_000),
            ..Default::default()
        }],
        ProducerSource::Microphone => vec![RtpEncodingParameters {
            max_bitrate: Some(64_000),
            ..Default::default()
        }],
    }
}

/// Resolution tiers a room can request; each rescales the encoding ladder's
/// bitrates relative to the SD baseline.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TargetResolution {
    QnHd,
    Sd,
    Hd,
    Fhd,
    Qhd,
}

impl TargetResolution {
    fn bitrate_factor(&self) -> f64 {
        match self {
            TargetResolution::QnHd => 0.25,
            TargetResolution::Sd => 1.0,
            TargetResolution::Hd => 4.0,
            TargetResolution::Fhd => 8.0,
            TargetResolution::Qhd => 16.0,
        }
    }
}

/// Rescales min/max bitrates of an encoding ladder for the target resolution.
pub fn update_encoding_bitrates(
    encodings: &mut [RtpEncodingParameters],
    resolution: TargetResolution,
) {
    let factor = resolution.bitrate_factor();

    for encoding in encodings {
        if let Some(max_bitrate) = encoding.max_bitrate {
            encoding.max_bitrate = Some((f64::from(max_bitrate) * factor) as u32);
        }
        if let Some(min_bitrate) = encoding.min_bitrate {
            encoding.min_bitrate = Some((f64::from(min_bitrate) * factor) as u32);
        }
    }
}

/// Fills in whatever the caller left out: an empty encoding list gets the
/// source's fallback ladder, and the negotiated codec always wins over the
/// caller-supplied one.
pub fn align_producer_options(
    options: &mut ProducerOptions,
    extended: &ExtendedRtpCapabilities,
) {
    if options.encodings.is_empty() {
        options.encodings = fallback_encodings(options.source);
    }

    if let Some(negotiated) = select_codec(options.source.kind(), extended) {
        options.codec = Some(negotiated);
    }
}
