/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The tag byte does not name any known frame type.
    ///
    /// Only the tag byte has been consumed when this is returned; the
    /// producer's intended frame length is unknowable, so the stream may
    /// be desynchronized from here on.
    #[error("unexpected command tag {tag:#04x}")]
    UnknownTag { tag: u8 },

    /// A declared length exceeds the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A property region is missing its NUL terminator.
    #[error("property bytes missing NUL terminator in {frame} frame")]
    MissingNul { frame: &'static str },

    /// A property name or value contains an interior NUL byte, which the
    /// wire layout cannot represent.
    #[error("property text contains interior NUL in {frame} frame")]
    EmbeddedNul { frame: &'static str },

    /// Property name or value bytes are not valid UTF-8.
    #[error("property text is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, WireError>;
