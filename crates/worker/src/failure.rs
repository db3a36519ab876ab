use derive_more::{Display, Error};
use sheaf_engine::error::{Error as EngineError, ErrorKind as EngineErrorKind};
use std::time::Duration;

/// Why a request did not produce a [`Response`](crate::Response).
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The input is password-protected. The user can fix this themselves.
    #[display("encrypted")]
    Encrypted,
    /// The input is structurally invalid.
    #[display("corrupt")]
    Corrupt,
    /// No answer arrived in time.
    #[display("timeout")]
    Timeout,
    #[display("unknown")]
    Unknown,
}

/// A request's failure, as plain data.
///
/// `message` is written for the end user.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn encrypted(name: &str) -> Self {
        Self::new(
            FailureKind::Encrypted,
            format!("File \"{name}\" is password-protected. Remove the password and try again."),
        )
    }

    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("Timed out waiting for {operation} after {:.1}s", after.as_secs_f32()),
        )
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// The worker is not running (never started, shut down, or crashed).
    pub fn unavailable() -> Self {
        Self::unknown("The document worker is not running")
    }

    pub fn is_encrypted(&self) -> bool {
        self.kind == FailureKind::Encrypted
    }
}

impl From<&EngineError> for Failure {
    fn from(err: &EngineError) -> Self {
        match &**err {
            EngineErrorKind::Encrypted(name) => Failure::encrypted(name),
            EngineErrorKind::Corrupt(name) => Failure::new(
                FailureKind::Corrupt,
                format!("Failed to load \"{name}\": the file is damaged or is not a PDF"),
            ),
            EngineErrorKind::UnsupportedImage(name) => {
                Failure::new(FailureKind::Corrupt, format!("Failed to load image: {name}"))
            },
            other => Failure::unknown(capitalise(&other.to_string())),
        }
    }
}

fn capitalise(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EngineErrorKind::Encrypted("a.pdf".into()), FailureKind::Encrypted)]
    #[case(EngineErrorKind::Corrupt("a.pdf".into()), FailureKind::Corrupt)]
    #[case(EngineErrorKind::UnsupportedImage("a.png".into()), FailureKind::Corrupt)]
    #[case(EngineErrorKind::EmptyBatch, FailureKind::Unknown)]
    #[case(EngineErrorKind::Encode, FailureKind::Unknown)]
    fn test_from_engine_error(#[case] kind: EngineErrorKind, #[case] expected: FailureKind) {
        let err = EngineError::from(kind);
        assert_eq!(Failure::from(&err).kind, expected);
    }

    #[test]
    fn encrypted_message_tells_the_user_what_to_do() {
        let failure = Failure::from(&EngineError::from(EngineErrorKind::Encrypted("tax.pdf".into())));
        assert!(failure.message.contains("\"tax.pdf\""));
        assert!(failure.message.contains("Remove the password"));
        assert_eq!(failure.to_string(), failure.message);
    }

    #[test]
    fn unknown_messages_are_capitalised() {
        let failure = Failure::from(&EngineError::from(EngineErrorKind::EmptyBatch));
        assert_eq!(failure.message, "No input files");
    }
}
