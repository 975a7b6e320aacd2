use botbridge_common::ReplyKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Per-request failures. None of these crash the process; they are returned
/// to whoever started the request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("content is {len} characters, over the {max} character limit; split it into smaller prompts")]
    ContentTooLarge { len: usize, max: usize },

    #[error("a request is already waiting on message {correlation_id}")]
    AlreadyRegistered { correlation_id: String },

    #[error("payload of kind {got:?} does not match the registered {expected:?} destination")]
    KindMismatch { expected: ReplyKind, got: ReplyKind },

    #[error("attachment is not a base64 data URI")]
    MalformedDataUri,

    #[error("attachment is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("unrecognized attachment type")]
    UnsupportedAttachment,

    #[error("upload succeeded but the message carries no attachment")]
    MissingAttachment,

    #[error(transparent)]
    Session(#[from] botbridge_channels::Error),
}
