use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// ErrAudioTransportNotAvailable indicates that an audio produce was
    /// attempted before a producer-capable transport exists.
    #[error("audio producer transport is not available")]
    ErrAudioTransportNotAvailable,

    /// ErrVideoTransportNotAvailable indicates that a video produce was
    /// attempted before a producer-capable transport exists.
    #[error("video producer transport is not available")]
    ErrVideoTransportNotAvailable,

    /// ErrScreenTransportNotAvailable indicates that a screen-share produce
    /// was attempted before a producer-capable transport exists.
    #[error("screen producer transport is not available")]
    ErrScreenTransportNotAvailable,

    /// ErrSocketNotConnected indicates an operation that requires a live
    /// signaling socket was invoked without one.
    #[error("socket is not connected")]
    ErrSocketNotConnected,

    /// ErrSocketClosed indicates the underlying transport closed while an
    /// operation was in flight.
    #[error("socket closed")]
    ErrSocketClosed,

    /// ErrSocketTimeout indicates an emit-with-ack round trip did not
    /// complete within the configured timeout.
    #[error("socket ack timed out")]
    ErrSocketTimeout,

    /// ErrInvalidSocketUrl indicates the socket URL could not be parsed or
    /// uses an unsupported scheme.
    #[error("invalid socket url")]
    ErrInvalidSocketUrl,

    /// ErrDeviceNotLoaded indicates the WebRTC device has not been loaded
    /// with router RTP capabilities yet.
    #[error("device not loaded with router rtp capabilities")]
    ErrDeviceNotLoaded,

    /// ErrRtpCapabilitiesMissing indicates local RTP capabilities were not
    /// available when the capability exchange was attempted.
    #[error("rtp capabilities are missing")]
    ErrRtpCapabilitiesMissing,

    /// ErrInvalidProfileLevelId indicates an H.264 profile-level-id value
    /// that is present but cannot be parsed.
    #[error("invalid H264 profile-level-id")]
    ErrInvalidProfileLevelId,

    /// ErrProfileMismatch indicates the two sides of an H.264 negotiation
    /// resolved to different profiles. The codec pair is unusable.
    #[error("H264 profile-level-id profiles do not match")]
    ErrProfileMismatch,

    /// ErrUnsupportedCodec indicates no negotiated codec exists for the
    /// requested media kind.
    #[error("no negotiated codec for requested media kind")]
    ErrUnsupportedCodec,

    /// ErrMissingTrack indicates a produce was attempted with a stream that
    /// carries no track of the requested kind.
    #[error("stream has no track of the requested kind")]
    ErrMissingTrack,

    /// ErrMediaAcquisition indicates local media acquisition failed.
    #[error("media acquisition failed: {0}")]
    ErrMediaAcquisition(String),

    /// ErrEmitFailed indicates a signaling emission could not be written to
    /// the transport.
    #[error("socket emit failed: {0}")]
    ErrEmitFailed(String),

    #[error("IoError: {0}")]
    ErrIoError(#[from] std::io::Error),

    #[error("JsonError: {0}")]
    ErrJsonError(#[from] serde_json::Error),

    #[error("WsError: {0}")]
    ErrWsError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Other errors: {0}")]
    ErrOthers(String),
}
