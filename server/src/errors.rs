use serde::Serialize;
use vectis_core::EngineError;

/// Error body of a protocol response: a stable `code` plus a human message.
/// Engine failures use the engine's kind name as the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ProtocolError {
    code: &'static str,
    message: String,
}

impl ProtocolError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            code: "InvalidArgument",
            message: message.into(),
        }
    }

    pub(crate) fn unknown_command(verb: &str) -> Self {
        Self {
            code: "UnknownCommand",
            message: format!("unknown command '{verb}', send HELP for the grammar"),
        }
    }

    pub(crate) fn line_too_long(limit: usize) -> Self {
        Self {
            code: "LineTooLong",
            message: format!("request line exceeds {limit} bytes"),
        }
    }

    pub(crate) fn too_many_connections(limit: usize) -> Self {
        Self {
            code: "TooManyConnections",
            message: format!("connection limit of {limit} reached"),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "Internal",
            message: message.into(),
        }
    }

    pub(crate) fn code(&self) -> &'static str {
        self.code
    }
}

impl From<EngineError> for ProtocolError {
    fn from(error: EngineError) -> Self {
        Self {
            code: error.kind(),
            message: error.to_string(),
        }
    }
}
