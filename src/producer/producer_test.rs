use super::*;
use crate::ortc::get_extended_rtp_capabilities;
use crate::rtp_parameters::{CodecParameters, RtcpFeedback, RtpCapabilities};
use crate::{MIME_TYPE_OPUS, MIME_TYPE_VP8};

fn extended_caps() -> ExtendedRtpCapabilities {
    let local = RtpCapabilities {
        codecs: vec![
            RtpCodecCapability {
                kind: MediaKind::Audio,
                mime_type: MIME_TYPE_OPUS.to_owned(),
                preferred_payload_type: Some(111),
                clock_rate: 48000,
                channels: Some(2),
                parameters: CodecParameters::new(),
                rtcp_feedback: vec![RtcpFeedback::new("transport-cc", "")],
            },
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: MIME_TYPE_VP8.to_owned(),
                preferred_payload_type: Some(96),
                clock_rate: 90000,
                channels: None,
                parameters: CodecParameters::new(),
                rtcp_feedback: vec![RtcpFeedback::new("nack", "")],
            },
        ],
        header_extensions: vec![],
    };
    let mut remote = local.clone();
    remote.codecs[0].preferred_payload_type = Some(100);
    remote.codecs[1].preferred_payload_type = Some(101);

    get_extended_rtp_capabilities(&local, &remote)
}

#[test]
fn test_select_codec_projects_local_payload_type() {
    let extended = extended_caps();

    let audio = select_codec(MediaKind::Audio, &extended).expect("audio codec");
    assert_eq!(audio.mime_type, MIME_TYPE_OPUS);
    assert_eq!(audio.preferred_payload_type, Some(111));
    assert_eq!(audio.channels, Some(2));

    let video = select_codec(MediaKind::Video, &extended).expect("video codec");
    assert_eq!(video.preferred_payload_type, Some(96));
}

#[test]
fn test_select_codec_none_for_unnegotiated_kind() {
    let mut extended = extended_caps();
    extended.codecs.retain(|c| c.kind != MediaKind::Video);

    assert!(select_codec(MediaKind::Video, &extended).is_none());
}

#[test]
fn test_camera_fallback_is_three_layer_simulcast() {
    let encodings = fallback_encodings(ProducerSource::Camera);

    assert_eq!(encodings.len(), 3);
    let rids: Vec<_> = encodings.iter().filter_map(|e| e.rid.as_deref()).collect();
    assert_eq!(rids, vec!["r0", "r1", "r2"]);

    assert_eq!(encodings[0].scale_resolution_down_by, Some(4.0));
    assert_eq!(encodings[1].scale_resolution_down_by, Some(2.0));
    assert_eq!(encodings[2].scale_resolution_down_by, Some(1.0));
    for encoding in &encodings {
        assert!(encoding.active);
        assert_eq!(encoding.scalability_mode.as_deref(), Some("L1T3"));
    }
}

#[test]
fn test_screen_fallback_is_single_layer_with_dtx() {
    let encodings = fallback_encodings(ProducerSource::Screen);

    assert_eq!(encodings.len(), 1);
    assert_eq!(encodings[0].dtx, Some(true));
    assert_eq!(encodings[0].max_bitrate, Some(2_000_000));
    assert!(encodings[0].rid.is_none());
}

#[test]
fn test_align_injects_fallback_encodings_only_when_empty() {
    let extended = extended_caps();

    let mut options = ProducerOptions {
        source: ProducerSource::Camera,
        ..Default::default()
    };
    align_producer_options(&mut options, &extended);
    assert_eq!(options.encodings.len(), 3);

    let custom = vec![RtpEncodingParameters {
        max_bitrate: Some(123_000),
        ..Default::default()
    }];
    let mut options = ProducerOptions {
        source: ProducerSource::Camera,
        encodings: custom.clone(),
        ..Default::default()
    };
    align_producer_options(&mut options, &extended);
    assert_eq!(options.encodings, custom);
}

#[test]
fn test_align_negotiated_codec_overrides_caller_codec() {
    let extended = extended_caps();

    let mut options = ProducerOptions {
        source: ProducerSource::Camera,
        codec: Some(RtpCodecCapability {
            kind: MediaKind::Video,
            mime_type: "video/VP9".to_owned(),
            preferred_payload_type: Some(98),
            clock_rate: 90000,
            channels: None,
            parameters: CodecParameters::new(),
            rtcp_feedback: vec![],
        }),
        ..Default::default()
    };
    align_producer_options(&mut options, &extended);

    let codec = options.codec.expect("codec");
    assert_eq!(codec.mime_type, MIME_TYPE_VP8);
    assert_eq!(codec.preferred_payload_type, Some(96));
}

#[test]
fn test_bitrate_factors_per_resolution() {
    let base = || {
        vec![RtpEncodingParameters {
            min_bitrate: Some(100_000),
            max_bitrate: Some(800_000),
            ..Default::default()
        }]
    };

    let tests = vec![
        (TargetResolution::QnHd, 25_000, 200_000),
        (TargetResolution::Sd, 100_000, 800_000),
        (TargetResolution::Hd, 400_000, 3_200_000),
        (TargetResolution::Fhd, 800_000, 6_400_000),
        (TargetResolution::Qhd, 1_600_000, 12_800_000),
    ];

    for (resolution, expected_min, expected_max) in tests {
        let mut encodings = base();
        update_encoding_bitrates(&mut encodings, resolution);
        assert_eq!(encodings[0].min_bitrate, Some(expected_min), "{resolution:?}");
        assert_eq!(encodings[0].max_bitrate, Some(expected_max), "{resolution:?}");
    }
}

#[test]
fn test_bitrate_update_skips_absent_fields() {
    let mut encodings = vec![RtpEncodingParameters::default()];
    update_encoding_bitrates(&mut encodings, TargetResolution::Qhd);

    assert_eq!(encodings[0].min_bitrate, None);
    assert_eq!(encodings[0].max_bitrate, None);
}
