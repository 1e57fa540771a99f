use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Serenity(#[from] serenity::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Channel(#[from] dcbridge_channels::Error),

    /// The connection never reached a usable state.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// A file reference could not be turned into bytes.
    #[error("failed to resolve {file}: {message}")]
    Resolution { file: String, message: String },

    /// Content sniffing found no known signature.
    #[error("unrecognized file format")]
    UnknownFormat,

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn resolution(file: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Resolution {
            file: file.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl From<Error> for dcbridge_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Channel(inner) => inner,
            Error::InvalidInput { message } => Self::invalid_input(message),
            other => Self::external("discord", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
