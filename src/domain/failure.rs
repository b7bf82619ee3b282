//! Failure taxonomy shared by both engines and the metrics recorder.

use serde::{Deserialize, Serialize};

/// Classification attached to every counted failure.
///
/// The class decides the response: transient failures are retried or
/// picked up next cycle, economic rejections are skipped quietly,
/// integrity violations halt the affected pipeline and alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// RPC/network/marketplace hiccup; safe to retry.
    Transient,
    /// A guard said no (cap reached, balance short, quote too thin).
    Economic,
    /// On-chain state contradicts what we paid for or expected.
    Integrity,
    /// Anything that escaped classification.
    Unexpected,
}

impl FailureKind {
    /// Stable label used for metric dimensions and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Economic => "economic",
            Self::Integrity => "integrity",
            Self::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(FailureKind::Transient.as_str(), "transient");
        assert_eq!(FailureKind::Economic.as_str(), "economic");
        assert_eq!(FailureKind::Integrity.as_str(), "integrity");
        assert_eq!(FailureKind::Unexpected.as_str(), "unexpected");
    }
}
