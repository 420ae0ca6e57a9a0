//! Shared utilities

use rho_session::{ReadinessStatus, RejectReason};

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// One-line description of an index status
pub fn readiness_str(status: &ReadinessStatus) -> String {
    match status {
        ReadinessStatus::Checking => "checking documents...".to_string(),
        ReadinessStatus::Processing { label, doc_count } => match doc_count {
            Some(n) => format!("{} ({} documents)", label, n),
            None => label.clone(),
        },
        ReadinessStatus::Ready { doc_count } => match doc_count {
            Some(n) => format!("ready ({} documents)", n),
            None => "ready".to_string(),
        },
        ReadinessStatus::Error { message } => match message {
            Some(m) => format!("error: {}", m),
            None => "error".to_string(),
        },
    }
}

/// Why a conversation cannot take questions once its readiness has settled.
/// `None` from the monitor means polling stopped without a final answer.
pub fn unqueryable_reason(settled: Option<&ReadinessStatus>) -> Option<String> {
    match settled {
        Some(ReadinessStatus::Ready { .. }) => None,
        Some(status) => Some(format!("cannot be queried ({})", readiness_str(status))),
        None => Some("could not determine the document status".to_string()),
    }
}

/// Why a question was not sent, for display
pub fn rejection_str(reason: &RejectReason) -> String {
    match reason {
        RejectReason::EmptyInput => "Nothing to send.".to_string(),
        RejectReason::NoConversation => {
            "No conversation open. Use /open <id> first.".to_string()
        }
        RejectReason::Busy => "Still answering the previous question.".to_string(),
        RejectReason::NotReady(ReadinessStatus::Error { .. }) => {
            "Document processing failed for this conversation; open another one.".to_string()
        }
        RejectReason::NotReady(status) => {
            format!("Documents are not ready yet ({}).", readiness_str(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("xin chào", 6), "xin ch...");
        assert_eq!(truncate_chars("chào", 4), "chào");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_readiness_str() {
        let building = ReadinessStatus::Processing {
            label: "building".into(),
            doc_count: Some(3),
        };
        assert_eq!(readiness_str(&building), "building (3 documents)");
        assert_eq!(
            readiness_str(&ReadinessStatus::Error { message: None }),
            "error"
        );
    }

    #[test]
    fn test_unqueryable_reason() {
        let ready = ReadinessStatus::Ready { doc_count: Some(2) };
        assert_eq!(unqueryable_reason(Some(&ready)), None);

        let failed = ReadinessStatus::Error {
            message: Some("no text".into()),
        };
        assert_eq!(
            unqueryable_reason(Some(&failed)).as_deref(),
            Some("cannot be queried (error: no text)")
        );

        let gave_up = unqueryable_reason(None).unwrap();
        assert!(gave_up.contains("could not determine"));
        assert!(!gave_up.contains("closed"));
    }

    #[test]
    fn test_rejection_str_mentions_status() {
        let reason = RejectReason::NotReady(ReadinessStatus::Processing {
            label: "building".into(),
            doc_count: None,
        });
        assert!(rejection_str(&reason).contains("building"));
    }
}
