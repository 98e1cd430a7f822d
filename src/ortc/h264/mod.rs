
use crate::error::{Error, Result};
use crate::rtp_parameters::{CodecParameterValue, CodecParameters};

/// H.264 profile as resolved from a `profile-level-id` value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Profile {
    ConstrainedBaseline,
    Baseline,
    Main,
    ConstrainedHigh,
    High,
}

/// H.264 level. Discriminants are the level_idc values carried on the wire;
/// Level 1b shares level_idc 11 with Level 1.1 and is told apart by the
/// constraint-set-3 flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Level {
    L1B = 0,
    L1 = 10,
    L1_1 = 11,
    L1_2 = 12,
    L1_3 = 13,
    L2 = 20,
    L2_1 = 21,
    L2_2 = 22,
    L3 = 30,
    L3_1 = 31,
    L3_2 = 32,
    L4 = 40,
    L4_1 = 41,
    L4_2 = 42,
    L5 = 50,
    L5_1 = 51,
    L5_2 = 52,
}

/// Parsed `profile-level-id` value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProfileLevelId {
    pub profile: Profile,
    pub level: Level,
}

/// Default when the parameter is absent: Constrained Baseline, Level 3.1.
pub const DEFAULT_PROFILE_LEVEL_ID: ProfileLevelId = ProfileLevelId {
    profile: Profile::ConstrainedBaseline,
    level: Level::L3_1,
};

const PROFILE_LEVEL_ID_KEY: &str = "profile-level-id";
const LEVEL_ASYMMETRY_ALLOWED_KEY: &str = "level-asymmetry-allowed";

// Constraint set 3 flag in profile_iop, used to signal Level 1b.
const CONSTRAINT_SET3_FLAG: u8 = 0x10;

/// Matcher for a profile_iop byte where some bits are significant ('0'/'1')
/// and the rest are don't-care ('x').
struct BitPattern {
    mask: u8,
    masked_value: u8,
}

impl BitPattern {
    fn new(pattern: &str) -> Self {
        debug_assert_eq!(pattern.len(), 8);
        let mut mask = 0u8;
        let mut masked_value = 0u8;
        for c in pattern.chars() {
            mask <<= 1;
            masked_value <<= 1;
            if c != 'x' {
                mask |= 1;
            }
            if c == '1' {
                masked_value |= 1;
            }
        }
        Self { mask, masked_value }
    }

    fn is_match(&self, value: u8) -> bool {
        value & self.mask == self.masked_value
    }
}

struct ProfilePattern {
    profile_idc: u8,
    profile_iop: BitPattern,
    profile: Profile,
}

lazy_static! {
    // Recognized (profile_idc, profile_iop) combinations, in matching order.
    static ref PROFILE_PATTERNS: Vec<ProfilePattern> = vec![
        ProfilePattern {
            profile_idc: 0x42,
            profile_iop: BitPattern::new("x1xx0000"),
            profile: Profile::ConstrainedBaseline,
        },
        ProfilePattern {
            profile_idc: 0x4d,
            profile_iop: BitPattern::new("1xxx0000"),
            profile: Profile::ConstrainedBaseline,
        },
        ProfilePattern {
            profile_idc: 0x58,
            profile_iop: BitPattern::new("11xx0000"),
            profile: Profile::ConstrainedBaseline,
        },
        ProfilePattern {
            profile_idc: 0x42,
            profile_iop: BitPattern::new("x0xx0000"),
            profile: Profile::Baseline,
        },
        ProfilePattern {
            profile_idc: 0x58,
            profile_iop: BitPattern::new("10xx0000"),
            profile: Profile::Baseline,
        },
        ProfilePattern {
            profile_idc: 0x4d,
            profile_iop: BitPattern::new("0x0x0000"),
            profile: Profile::Main,
        },
        ProfilePattern {
            profile_idc: 0x64,
            profile_iop: BitPattern::new("00000000"),
            profile: Profile::High,
        },
        ProfilePattern {
            profile_idc: 0x64,
            profile_iop: BitPattern::new("00001100"),
            profile: Profile::ConstrainedHigh,
        },
    ];
}

/// Parses a 6-hex-digit `profile-level-id` string. Returns `None` on any
/// malformed input or unrecognized profile bit pattern.
pub fn parse_profile_level_id(s: &str) -> Option<ProfileLevelId> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let numeric = u32::from_str_radix(s, 16).ok()?;
    if numeric == 0 {
        return None;
    }

    let level_idc = (numeric & 0xff) as u8;
    let profile_iop = ((numeric >> 8) & 0xff) as u8;
    let profile_idc = ((numeric >> 16) & 0xff) as u8;

    let level = match level_idc {
        10 => Level::L1,
        11 => {
            if profile_iop & CONSTRAINT_SET3_FLAG != 0 {
                Level::L1B
            } else {
                Level::L1_1
            }
        }
        12 => Level::L1_2,
        13 => Level::L1_3,
        20 => Level::L2,
        21 => Level::L2_1,
        22 => Level::L2_2,
        30 => Level::L3,
        31 => Level::L3_1,
        32 => Level::L3_2,
        40 => Level::L4,
        41 => Level::L4_1,
        42 => Level::L4_2,
        50 => Level::L5,
        51 => Level::L5_1,
        52 => Level::L5_2,
        _ => return None,
    };

    let profile = PROFILE_PATTERNS
        .iter()
        .find(|p| p.profile_idc == profile_idc && p.profile_iop.is_match(profile_iop))
        .map(|p| p.profile)?;

    Some(ProfileLevelId { profile, level })
}

/// Encodes a `ProfileLevelId` back to its 6-hex-digit string form, using the
/// 3-byte profile-idc | profile-iop | level-idc layout. Level 1b has no
/// generic encoding; only Constrained Baseline, Baseline and Main carry a
/// defined 1b form.
pub fn profile_level_id_to_string(profile_level_id: &ProfileLevelId) -> Option<String> {
    if profile_level_id.level == Level::L1B {
        return match profile_level_id.profile {
            Profile::ConstrainedBaseline => Some("42f00b".to_owned()),
            Profile::Baseline => Some("42100b".to_owned()),
            Profile::Main => Some("4d100b".to_owned()),
            _ => None,
        };
    }

    let profile_idc_iop = match profile_level_id.profile {
        Profile::ConstrainedBaseline => "42e0",
        Profile::Baseline => "4200",
        Profile::Main => "4d00",
        Profile::ConstrainedHigh => "640c",
        Profile::High => "6400",
    };

    Some(format!("{}{:02x}", profile_idc_iop, profile_level_id.level as u8))
}

/// Parses the `profile-level-id` entry of an fmtp-style parameter set. A
/// missing entry yields the default (Constrained Baseline, Level 3.1); a
/// present but malformed entry yields `None`.
pub fn parse_sdp_profile_level_id(parameters: &CodecParameters) -> Option<ProfileLevelId> {
    match parameters.get(PROFILE_LEVEL_ID_KEY) {
        None => Some(DEFAULT_PROFILE_LEVEL_ID),
        Some(CodecParameterValue::String(s)) => parse_profile_level_id(s),
        Some(CodecParameterValue::Number(n)) => parse_profile_level_id(&format!("{n:06x}")),
        Some(CodecParameterValue::Bool(_)) => None,
    }
}

/// Whether both parameter sets resolve to the same H.264 profile. A parse
/// failure on either side is treated as "not same".
pub fn is_same_profile(local_parameters: &CodecParameters, remote_parameters: &CodecParameters) -> bool {
    match (
        parse_sdp_profile_level_id(local_parameters),
        parse_sdp_profile_level_id(remote_parameters),
    ) {
        (Some(local), Some(remote)) => local.profile == remote.profile,
        _ => false,
    }
}

// Level 1b sorts below Level 1.0 for negotiation purposes.
fn is_less_level(a: Level, b: Level) -> bool {
    if a == Level::L1B {
        return b != Level::L1B;
    }
    if b == Level::L1B {
        return false;
    }
    (a as u8) < (b as u8)
}

fn min_level(a: Level, b: Level) -> Level {
    if is_less_level(a, b) {
        a
    } else {
        b
    }
}

fn is_level_asymmetry_allowed(parameters: &CodecParameters) -> bool {
    match parameters.get(LEVEL_ASYMMETRY_ALLOWED_KEY) {
        Some(CodecParameterValue::Number(n)) => *n == 1,
        Some(CodecParameterValue::String(s)) => s == "1" || s == "true",
        Some(CodecParameterValue::Bool(b)) => *b,
        None => false,
    }
}

/// Negotiates the `profile-level-id` an answer should carry, given the local
/// and remote fmtp-style parameter sets.
///
/// Returns `Ok(None)` when neither side specifies the parameter. Fails when a
/// present value is unparseable or when the resolved profiles differ; both
/// are hard negotiation errors, not recoverable within this call.
///
/// If both sides allow level asymmetry the local level is answered;
/// otherwise the numerically lower of the two levels wins, with Level 1b
/// below Level 1.0.
pub fn generate_profile_level_id_for_answer(
    local_parameters: &CodecParameters,
    remote_parameters: &CodecParameters,
) -> Result<Option<String>> {
    if local_parameters.get(PROFILE_LEVEL_ID_KEY).is_none()
        && remote_parameters.get(PROFILE_LEVEL_ID_KEY).is_none()
    {
        return Ok(None);
    }

    let local_profile_level_id =
        parse_sdp_profile_level_id(local_parameters).ok_or(Error::ErrInvalidProfileLevelId)?;
    let remote_profile_level_id =
        parse_sdp_profile_level_id(remote_parameters).ok_or(Error::ErrInvalidProfileLevelId)?;

    if local_profile_level_id.profile != remote_profile_level_id.profile {
        return Err(Error::ErrProfileMismatch);
    }

    let level_asymmetry_allowed = is_level_asymmetry_allowed(local_parameters)
        && is_level_asymmetry_allowed(remote_parameters);

    let answer_level = if level_asymmetry_allowed {
        local_profile_level_id.level
    } else {
        min_level(local_profile_level_id.level, remote_profile_level_id.level)
    };

    let answer = ProfileLevelId {
        profile: local_profile_level_id.profile,
        level: answer_level,
    };

    profile_level_id_to_string(&answer)
        .map(Some)
        .ok_or(Error::ErrInvalidProfileLevelId)
}
