use super::*;

#[test]
fn test_encoding_parameters_absent_fields_are_not_serialized() {
    let encoding = RtpEncodingParameters {
        max_bitrate: Some(300_000),
        scale_resolution_down_by: Some(4.0),
        ..Default::default()
    };

    let json = serde_json::to_string(&encoding).expect("serialize");

    assert!(!json.contains("null"), "explicit null leaked into {json}");
    assert!(!json.contains("rid"), "absent rid leaked into {json}");
    assert!(!json.contains("ssrc"), "absent ssrc leaked into {json}");
    assert!(json.contains("\"active\":true"));
    assert!(json.contains("\"maxBitrate\":300000"));
}

#[test]
fn test_encoding_parameters_active_defaults_true_on_deserialize() {
    let encoding: RtpEncodingParameters =
        serde_json::from_str(r#"{"rid":"r0","maxBitrate":100000}"#).expect("deserialize");

    assert!(encoding.active);
    assert_eq!(encoding.rid.as_deref(), Some("r0"));
    assert_eq!(encoding.max_bitrate, Some(100_000));
}

#[test]
fn test_codec_capability_rtx_detection_is_case_insensitive() {
    let codec = RtpCodecCapability {
        kind: MediaKind::Video,
        mime_type: "video/RTX".to_owned(),
        preferred_payload_type: Some(97),
        clock_rate: 90000,
        channels: None,
        parameters: [("apt".to_owned(), CodecParameterValue::from(96))].into(),
        rtcp_feedback: vec![],
    };

    assert!(codec.is_rtx());
    assert_eq!(codec.apt(), Some(96));
}

#[test]
fn test_codec_capability_apt_accepts_string_values() {
    let codec = RtpCodecCapability {
        kind: MediaKind::Video,
        mime_type: "video/rtx".to_owned(),
        preferred_payload_type: Some(97),
        clock_rate: 90000,
        channels: None,
        parameters: [("apt".to_owned(), CodecParameterValue::from("96"))].into(),
        rtcp_feedback: vec![],
    };

    assert_eq!(codec.apt(), Some(96));
}

#[test]
fn test_rtp_capabilities_camel_case_round_trip() {
    let json = r#"{
        "codecs": [{
            "kind": "audio",
            "mimeType": "audio/opus",
            "preferredPayloadType": 111,
            "clockRate": 48000,
            "channels": 2,
            "parameters": {"useinbandfec": 1},
            "rtcpFeedback": [{"type": "transport-cc"}]
        }],
        "headerExtensions": [{
            "kind": "audio",
            "uri": "urn:ietf:params:rtp-hdrext:ssrc-audio-level",
            "preferredId": 1,
            "direction": "sendrecv"
        }]
    }"#;

    let caps: RtpCapabilities = serde_json::from_str(json).expect("deserialize");
    assert_eq!(caps.codecs.len(), 1);
    assert_eq!(caps.codecs[0].preferred_payload_type, Some(111));
    assert_eq!(caps.codecs[0].rtcp_feedback[0].typ, "transport-cc");
    assert_eq!(caps.codecs[0].rtcp_feedback[0].parameter, "");
    assert_eq!(
        caps.header_extensions[0].direction,
        RtpHeaderExtensionDirection::SendRecv
    );

    let back = serde_json::to_value(&caps).expect("serialize");
    assert_eq!(back["codecs"][0]["preferredPayloadType"], 111);
    assert_eq!(back["codecs"][0]["mimeType"], "audio/opus");
}

#[test]
fn test_header_extension_direction_defaults_to_sendrecv() {
    let ext: RtpHeaderExtension = serde_json::from_str(
        r#"{"uri": "urn:ietf:params:rtp-hdrext:sdes:mid", "preferredId": 4}"#,
    )
    .expect("deserialize");

    assert_eq!(ext.direction, RtpHeaderExtensionDirection::SendRecv);
    assert!(!ext.preferred_encrypt);
    assert_eq!(ext.kind, None);
}
