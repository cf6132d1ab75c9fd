//! Best-effort PII scrubbing applied to the query and the final
//! generated text before either is persisted into conversation memory
//! (spec §4.12). No teacher or pack file scrubs PII directly; this
//! follows the repo's own established regex-pattern idiom (`static
//! LazyLock<Regex>`, as in `amber-retrieval::filters`).

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap());
static SSN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static CREDIT_CARD_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap());

/// Replaces emails, phone numbers, SSNs, and credit-card-shaped digit
/// runs with a labeled placeholder. Not a guarantee of complete
/// removal, only a best-effort filter applied before persistence.
#[must_use]
pub fn scrub_pii(text: &str) -> String {
    let scrubbed = EMAIL_PATTERN.replace_all(text, "[REDACTED_EMAIL]");
    let scrubbed = SSN_PATTERN.replace_all(&scrubbed, "[REDACTED_SSN]");
    let scrubbed = CREDIT_CARD_PATTERN.replace_all(&scrubbed, "[REDACTED_CARD]");
    let scrubbed = PHONE_PATTERN.replace_all(&scrubbed, "[REDACTED_PHONE]");
    scrubbed.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_email_addresses() {
        assert_eq!(scrub_pii("contact me at jane.doe@example.com please"), "contact me at [REDACTED_EMAIL] please");
    }

    #[test]
    fn redacts_phone_numbers() {
        assert_eq!(scrub_pii("call 555-123-4567 now"), "call [REDACTED_PHONE] now");
    }

    #[test]
    fn redacts_social_security_numbers() {
        assert_eq!(scrub_pii("ssn is 123-45-6789"), "ssn is [REDACTED_SSN]");
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        assert_eq!(scrub_pii("the refund policy allows 30 days"), "the refund policy allows 30 days");
    }
}
