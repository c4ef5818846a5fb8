//! Redaction of real data for the degraded (Mirror) view.
//!
//! Every decimal digit is masked first. Labelled fields are then replaced
//! with a fixed mask per family. The patterns anchor on the label, so they
//! still match once the digits have been replaced.

use std::sync::LazyLock;

use regex::{Captures, Regex};

const DIGIT_MASK: &str = "*";

/// A quoted string or a bare token.
const TOKEN_VALUE: &str = r#"(?:"[^"]*"|'[^']*'|[^\s,;&"'}]+)"#;
const EMAIL_VALUE: &str = r#"['"]?[^@\s,;"']+@[^@\s,;"']+\.[^@\s,;"'}]+['"]?"#;
const CARD_VALUE: &str = r#"['"]?[\d*]{4}[- ]?[\d*]{4}[- ]?[\d*]{4}[- ]?[\d*]{4}['"]?"#;

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]").expect("invalid digit pattern"));

static REDACTIONS: LazyLock<Vec<Redaction>> = LazyLock::new(|| {
    vec![
        Redaction::new("password|passwd|senha", TOKEN_VALUE, "********"),
        Redaction::new("api_key|token|secret", TOKEN_VALUE, "********"),
        Redaction::new("ssn|cpf", TOKEN_VALUE, "***.***.***-**"),
        Redaction::new("email", EMAIL_VALUE, "***@***.***"),
        Redaction::new("cartao|card", CARD_VALUE, "****-****-****-****"),
    ]
});

struct Redaction {
    regex: Regex,
    mask: &'static str,
}

impl Redaction {
    fn new(labels: &str, value: &str, mask: &'static str) -> Self {
        // Quotes around the label are dropped together with the value.
        let pattern = format!(r#"(?i)['"]?\b({labels})['"]?\s*[:=]\s*{value}"#);
        Self {
            regex: Regex::new(&pattern).expect("invalid redaction pattern"),
            mask,
        }
    }

    fn apply(&self, input: &str) -> String {
        self.regex
            .replace_all(input, |caps: &Captures<'_>| {
                format!("{}={}", caps[1].to_ascii_lowercase(), self.mask)
            })
            .into_owned()
    }
}

/// Produce the redacted view of `data`.
pub fn sanitize(data: &str) -> String {
    let masked = DIGITS.replace_all(data, DIGIT_MASK);
    REDACTIONS
        .iter()
        .fold(masked.into_owned(), |acc, redaction| redaction.apply(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_every_digit() {
        assert_eq!(sanitize("balance 1000.50"), "balance ****.**");
        assert_eq!(sanitize("no digits here"), "no digits here");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_password_family() {
        assert_eq!(sanitize("senha=hunter"), "senha=********");
        assert_eq!(sanitize("Password: abc123"), "password=********");
        assert_eq!(sanitize("user=bob passwd=x"), "user=bob passwd=********");
    }

    #[test]
    fn test_token_family() {
        assert_eq!(sanitize("token=abcdef;next"), "token=********;next");
        assert_eq!(sanitize("api_key: K"), "api_key=********");
        assert_eq!(
            sanitize(r#"{"secret": "DADOS SECRETOS"}"#),
            r#"{secret=********}"#
        );
    }

    #[test]
    fn test_quoted_keys_lose_both_quotes() {
        assert_eq!(
            sanitize(r#"{"status": "ok", "password": "p4ss"}"#),
            r#"{"status": "ok", password=********}"#
        );
        assert_eq!(sanitize("{'token': 'abc'}"), "{token=********}");
        let once = sanitize(r#"{"secret": "x"}"#);
        assert_eq!(once.matches('"').count(), 0);
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_national_id_after_digit_masking() {
        assert_eq!(sanitize("cpf=12345678901"), "cpf=***.***.***-**");
        assert_eq!(sanitize("SSN: 123-45-6789"), "ssn=***.***.***-**");
    }

    #[test]
    fn test_email() {
        assert_eq!(
            sanitize("email=joao@example.com, ok"),
            "email=***@***.***, ok"
        );
    }

    #[test]
    fn test_card() {
        assert_eq!(
            sanitize("cartao=1234 5678 9012 3456"),
            "cartao=****-****-****-****"
        );
        assert_eq!(
            sanitize("card: 1234-5678-9012-3456 end"),
            "card=****-****-****-**** end"
        );
    }

    #[test]
    fn test_unlabelled_text_only_loses_digits() {
        let out = sanitize("account 42 belongs to maria");
        assert_eq!(out, "account ** belongs to maria");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize("senha=abc cpf=12345678901 email=a@b.co");
        assert_eq!(sanitize(&once), once);
    }
}
