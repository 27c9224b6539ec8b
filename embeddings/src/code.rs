use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure kinds reported to callers of the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileNotFound,
    UnprocessableFile,
    UnsupportedCodec,
    UnknownProcessingError,
}

/// Message fragments checked in order; the first hit wins.
const RULES: [(&str, ErrorCode); 3] = [
    ("No such file or directory", ErrorCode::FileNotFound),
    ("Could not find stream information", ErrorCode::UnprocessableFile),
    ("Unsupported codec!", ErrorCode::UnsupportedCodec),
];

impl ErrorCode {
    /// Maps a failure message to its code.
    pub fn classify(message: &str) -> Self {
        RULES
            .iter()
            .find(|(phrase, _)| message.contains(phrase))
            .map(|&(_, code)| code)
            .unwrap_or(ErrorCode::UnknownProcessingError)
    }

    /// Reports whether the failure is the service's fault rather than the input's.
    pub fn is_server_fault(self) -> bool {
        self == ErrorCode::UnknownProcessingError
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::UnprocessableFile => "UNPROCESSABLE_FILE",
            ErrorCode::UnsupportedCodec => "UNSUPPORTED_CODEC",
            ErrorCode::UnknownProcessingError => "UNKNOWN_PROCESSING_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_phrases() {
        assert_eq!(
            ErrorCode::classify("No such file or directory: /a.mp3"),
            ErrorCode::FileNotFound
        );
        assert_eq!(
            ErrorCode::classify("Could not find stream information: /a.mp3"),
            ErrorCode::UnprocessableFile
        );
        assert_eq!(
            ErrorCode::classify("Unsupported codec! opus"),
            ErrorCode::UnsupportedCodec
        );
        assert_eq!(
            ErrorCode::classify("out of memory"),
            ErrorCode::UnknownProcessingError
        );
        assert_eq!(ErrorCode::classify(""), ErrorCode::UnknownProcessingError);
    }

    #[test]
    fn classify_first_match_wins() {
        let msg = "Unsupported codec! then Could not find stream information, \
                   No such file or directory";
        assert_eq!(ErrorCode::classify(msg), ErrorCode::FileNotFound);

        let msg = "Unsupported codec! Could not find stream information";
        assert_eq!(ErrorCode::classify(msg), ErrorCode::UnprocessableFile);
    }

    #[test]
    fn classify_is_case_sensitive() {
        assert_eq!(
            ErrorCode::classify("no such file or directory"),
            ErrorCode::UnknownProcessingError
        );
    }

    #[test]
    fn server_fault() {
        assert!(ErrorCode::UnknownProcessingError.is_server_fault());
        assert!(!ErrorCode::FileNotFound.is_server_fault());
        assert!(!ErrorCode::UnprocessableFile.is_server_fault());
        assert!(!ErrorCode::UnsupportedCodec.is_server_fault());
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedCodec).unwrap();
        assert_eq!(json, r#""UNSUPPORTED_CODEC""#);
        let code: ErrorCode = serde_json::from_str(r#""UNKNOWN_PROCESSING_ERROR""#).unwrap();
        assert_eq!(code, ErrorCode::UnknownProcessingError);
        assert_eq!(ErrorCode::FileNotFound.to_string(), "FILE_NOT_FOUND");
    }
}
