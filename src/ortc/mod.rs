pub mod h264;


use crate::rtp_parameters::{
    CodecParameterValue, ExtendedRtpCapabilities, ExtendedRtpCodec, ExtendedRtpHeaderExtension,
    MediaKind, RtcpFeedback, RtpCapabilities, RtpCodecCapability, RtpCodecParameters,
    RtpHeaderExtension, RtpHeaderExtensionDirection, RtpHeaderExtensionParameters, RtpParameters,
};

const TWCC_URI: &str = "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";

/// Whether two codec capabilities are interoperable.
///
/// Codecs match only when mime type (case insensitive), clock rate and
/// channel count are identical. H264 additionally requires an exact
/// `packetization-mode` match and, in strict mode, a compatible
/// `profile-level-id`; with `modify` the negotiated answer is written back
/// into both parameter sets (or the key removed when negotiation yields
/// none). VP9 in strict mode requires an equal `profile-id` (default 0).
///
/// A `false` return means the caller skips that remote codec entirely.
pub fn match_codecs(
    a: &mut RtpCodecCapability,
    b: &mut RtpCodecCapability,
    strict: bool,
    modify: bool,
) -> bool {
    let a_mime_type = a.mime_type.to_lowercase();

    if a_mime_type != b.mime_type.to_lowercase() {
        return false;
    }
    if a.clock_rate != b.clock_rate {
        return false;
    }
    if a.channels != b.channels {
        return false;
    }

    match a_mime_type.as_str() {
        "video/h264" => {
            let packetization_mode_a = a
                .parameters
                .get("packetization-mode")
                .and_then(|v| v.as_u32())
                .unwrap_or(0);
            let packetization_mode_b = b
                .parameters
                .get("packetization-mode")
                .and_then(|v| v.as_u32())
                .unwrap_or(0);

            if packetization_mode_a != packetization_mode_b {
                return false;
            }

            if strict {
                if !h264::is_same_profile(&a.parameters, &b.parameters) {
                    return false;
                }

                let selected_profile_level_id = match h264::generate_profile_level_id_for_answer(
                    &a.parameters,
                    &b.parameters,
                ) {
                    Ok(selected) => selected,
                    Err(_) => return false,
                };

                if modify {
                    match selected_profile_level_id {
                        Some(profile_level_id) => {
                            let value = CodecParameterValue::String(profile_level_id);
                            a.parameters
                                .insert("profile-level-id".to_owned(), value.clone());
                            b.parameters.insert("profile-level-id".to_owned(), value);
                        }
                        None => {
                            a.parameters.remove("profile-level-id");
                            b.parameters.remove("profile-level-id");
                        }
                    }
                }
            }
        }
        "video/vp9" => {
            if strict {
                let profile_id_a = a
                    .parameters
                    .get("profile-id")
                    .and_then(|v| v.as_u32())
                    .unwrap_or(0);
                let profile_id_b = b
                    .parameters
                    .get("profile-id")
                    .and_then(|v| v.as_u32())
                    .unwrap_or(0);

                if profile_id_a != profile_id_b {
                    return false;
                }
            }
        }
        _ => {}
    }

    true
}

/// Keeps only the feedback entries present in both lists (type and parameter
/// equal). Order follows `a`.
pub fn reduce_rtcp_feedback(a: &[RtcpFeedback], b: &[RtcpFeedback]) -> Vec<RtcpFeedback> {
    a.iter()
        .filter(|a_fb| {
            b.iter()
                .any(|b_fb| b_fb.typ == a_fb.typ && b_fb.parameter == a_fb.parameter)
        })
        .cloned()
        .collect()
}

/// Whether a local and a remote header extension refer to the same thing:
/// kinds are compatible (either side unset, or equal) and URIs match exactly.
pub fn match_header_extensions(local: &RtpHeaderExtension, remote: &RtpHeaderExtension) -> bool {
    let kinds_compatible = match (local.kind, remote.kind) {
        (Some(l), Some(r)) => l == r,
        _ => true,
    };

    kinds_compatible && local.uri == remote.uri
}

// The extension direction as seen from our side, given what the remote
// advertises. A remote that only receives means we may only send.
fn flip_direction(remote: RtpHeaderExtensionDirection) -> RtpHeaderExtensionDirection {
    match remote {
        RtpHeaderExtensionDirection::SendRecv => RtpHeaderExtensionDirection::SendRecv,
        RtpHeaderExtensionDirection::RecvOnly => RtpHeaderExtensionDirection::SendOnly,
        RtpHeaderExtensionDirection::SendOnly => RtpHeaderExtensionDirection::RecvOnly,
        RtpHeaderExtensionDirection::Inactive => RtpHeaderExtensionDirection::Inactive,
    }
}

/// Computes the extended capabilities pairing each usable codec and header
/// extension with both its local and remote identifiers.
///
/// Remote RTX codecs are not considered directly; they are attached to their
/// primary codec afterwards through the `apt` parameter, per side
/// independently. Codecs lacking a preferred payload type on either side are
/// dropped.
pub fn get_extended_rtp_capabilities(
    local_caps: &RtpCapabilities,
    remote_caps: &RtpCapabilities,
) -> ExtendedRtpCapabilities {
    let mut extended = ExtendedRtpCapabilities::default();

    for remote_codec in &remote_caps.codecs {
        if remote_codec.is_rtx() {
            continue;
        }
        let Some(remote_payload_type) = remote_codec.preferred_payload_type else {
            continue;
        };

        let mut remote_codec = remote_codec.clone();

        let matching_local_codec = local_caps.codecs.iter().find_map(|local_codec| {
            local_codec.preferred_payload_type?;
            let mut local_codec = local_codec.clone();
            if match_codecs(&mut local_codec, &mut remote_codec, true, true) {
                Some(local_codec)
            } else {
                None
            }
        });

        let Some(local_codec) = matching_local_codec else {
            continue;
        };
        let Some(local_payload_type) = local_codec.preferred_payload_type else {
            continue;
        };

        extended.codecs.push(ExtendedRtpCodec {
            kind: local_codec.kind,
            mime_type: local_codec.mime_type.clone(),
            clock_rate: local_codec.clock_rate,
            channels: local_codec.channels,
            local_payload_type,
            remote_payload_type,
            local_rtx_payload_type: None,
            remote_rtx_payload_type: None,
            local_parameters: local_codec.parameters.clone(),
            remote_parameters: remote_codec.parameters.clone(),
            rtcp_feedback: reduce_rtcp_feedback(
                &local_codec.rtcp_feedback,
                &remote_codec.rtcp_feedback,
            ),
        });
    }

    // Attach RTX payload types, each side paired independently via apt.
    for extended_codec in &mut extended.codecs {
        extended_codec.local_rtx_payload_type = local_caps
            .codecs
            .iter()
            .find(|codec| {
                codec.is_rtx() && codec.apt() == Some(u32::from(extended_codec.local_payload_type))
            })
            .and_then(|codec| codec.preferred_payload_type);

        extended_codec.remote_rtx_payload_type = remote_caps
            .codecs
            .iter()
            .find(|codec| {
                codec.is_rtx() && codec.apt() == Some(u32::from(extended_codec.remote_payload_type))
            })
            .and_then(|codec| codec.preferred_payload_type);
    }

    for remote_ext in &remote_caps.header_extensions {
        let Some(local_ext) = local_caps
            .header_extensions
            .iter()
            .find(|local_ext| match_header_extensions(local_ext, remote_ext))
        else {
            continue;
        };

        extended.header_extensions.push(ExtendedRtpHeaderExtension {
            kind: remote_ext.kind,
            uri: remote_ext.uri.clone(),
            send_id: local_ext.preferred_id,
            recv_id: remote_ext.preferred_id,
            encrypt: local_ext.preferred_encrypt,
            direction: flip_direction(remote_ext.direction),
        });
    }

    extended
}

fn rtx_mime_type(kind: MediaKind) -> String {
    format!("{kind}/rtx")
}

/// Reconstructs the receive-side capability set from extended capabilities.
///
/// Each codec is advertised under its *remote* payload type with its *local*
/// parameters: the capability is what this side can decode, using the ids
/// the remote side uses. Codecs with a remote RTX payload type get an RTX
/// entry whose apt points at the codec's remote payload type.
pub fn get_recv_rtp_capabilities(extended: &ExtendedRtpCapabilities) -> RtpCapabilities {
    let mut caps = RtpCapabilities::default();

    for extended_codec in &extended.codecs {
        caps.codecs.push(RtpCodecCapability {
            kind: extended_codec.kind,
            mime_type: extended_codec.mime_type.clone(),
            preferred_payload_type: Some(extended_codec.remote_payload_type),
            clock_rate: extended_codec.clock_rate,
            channels: extended_codec.channels,
            parameters: extended_codec.local_parameters.clone(),
            rtcp_feedback: extended_codec.rtcp_feedback.clone(),
        });

        let Some(remote_rtx_payload_type) = extended_codec.remote_rtx_payload_type else {
            continue;
        };

        caps.codecs.push(RtpCodecCapability {
            kind: extended_codec.kind,
            mime_type: rtx_mime_type(extended_codec.kind),
            preferred_payload_type: Some(remote_rtx_payload_type),
            clock_rate: extended_codec.clock_rate,
            channels: None,
            parameters: [(
                "apt".to_owned(),
                CodecParameterValue::Number(u32::from(extended_codec.remote_payload_type)),
            )]
            .into(),
            rtcp_feedback: vec![],
        });
    }

    for extended_ext in &extended.header_extensions {
        // Ignore extensions we cannot receive.
        if !matches!(
            extended_ext.direction,
            RtpHeaderExtensionDirection::SendRecv | RtpHeaderExtensionDirection::RecvOnly
        ) {
            continue;
        }

        caps.header_extensions.push(RtpHeaderExtension {
            kind: extended_ext.kind,
            uri: extended_ext.uri.clone(),
            preferred_id: extended_ext.recv_id,
            preferred_encrypt: extended_ext.encrypt,
            direction: extended_ext.direction,
        });
    }

    caps
}

/// Generates sending RTP parameters of the given kind, bound to the local
/// payload types and parameters. Encodings and mid are left for the caller.
pub fn get_sending_rtp_parameters(
    kind: MediaKind,
    extended: &ExtendedRtpCapabilities,
) -> RtpParameters {
    let mut params = RtpParameters::default();

    for extended_codec in &extended.codecs {
        if extended_codec.kind != kind {
            continue;
        }

        params.codecs.push(RtpCodecParameters {
            mime_type: extended_codec.mime_type.clone(),
            payload_type: extended_codec.local_payload_type,
            clock_rate: extended_codec.clock_rate,
            channels: extended_codec.channels,
            parameters: extended_codec.local_parameters.clone(),
            rtcp_feedback: extended_codec.rtcp_feedback.clone(),
        });

        if let Some(local_rtx_payload_type) = extended_codec.local_rtx_payload_type {
            params.codecs.push(RtpCodecParameters {
                mime_type: rtx_mime_type(extended_codec.kind),
                payload_type: local_rtx_payload_type,
                clock_rate: extended_codec.clock_rate,
                channels: None,
                parameters: [(
                    "apt".to_owned(),
                    CodecParameterValue::Number(u32::from(extended_codec.local_payload_type)),
                )]
                .into(),
                rtcp_feedback: vec![],
            });
        }
    }

    for extended_ext in &extended.header_extensions {
        if extended_ext.kind.is_some() && extended_ext.kind != Some(kind) {
            continue;
        }
        if !matches!(
            extended_ext.direction,
            RtpHeaderExtensionDirection::SendRecv | RtpHeaderExtensionDirection::SendOnly
        ) {
            continue;
        }

        params.header_extensions.push(RtpHeaderExtensionParameters {
            uri: extended_ext.uri.clone(),
            id: extended_ext.send_id,
            encrypt: extended_ext.encrypt,
        });
    }

    params
}

/// Sending parameters as the remote SFU expects them: codecs carry the
/// *remote* parameter sets, and codec feedback is reduced according to the
/// congestion-control extension the remote actually supports.
pub fn get_sending_remote_rtp_parameters(
    kind: MediaKind,
    extended: &ExtendedRtpCapabilities,
) -> RtpParameters {
    let mut params = get_sending_rtp_parameters(kind, extended);

    for (codec, extended_codec) in params
        .codecs
        .iter_mut()
        .filter(|codec| !codec.is_rtx())
        .zip(extended.codecs.iter().filter(|c| c.kind == kind))
    {
        codec.parameters = extended_codec.remote_parameters.clone();
    }

    let has_twcc = params.header_extensions.iter().any(|ext| ext.uri == TWCC_URI);
    let has_abs_send_time = params
        .header_extensions
        .iter()
        .any(|ext| ext.uri == ABS_SEND_TIME_URI);

    for codec in &mut params.codecs {
        if has_twcc {
            codec.rtcp_feedback.retain(|fb| fb.typ != "goog-remb");
        } else if has_abs_send_time {
            codec.rtcp_feedback.retain(|fb| fb.typ != "transport-cc");
        } else {
            codec
                .rtcp_feedback
                .retain(|fb| fb.typ != "goog-remb" && fb.typ != "transport-cc");
        }
    }

    params
}

/// Whether the extended capabilities allow sending the given kind. True only
/// if at least one negotiated codec of that kind exists; extended codecs
/// always carry a local payload type by construction.
pub fn can_send(kind: MediaKind, extended: &ExtendedRtpCapabilities) -> bool {
    extended.codecs.iter().any(|codec| codec.kind == kind)
}

/// Whether the given RTP parameters (as announced by the remote for a new
/// producer) can be consumed with the extended capabilities.
pub fn can_receive(rtp_parameters: &RtpParameters, extended: &ExtendedRtpCapabilities) -> bool {
    let Some(first_codec) = rtp_parameters.codecs.first() else {
        return false;
    };

    extended
        .codecs
        .iter()
        .any(|codec| codec.remote_payload_type == first_codec.payload_type)
}
