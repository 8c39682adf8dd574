//! Maps provider error text onto [`ErrorKind`] with an operator-facing message.
//!
//! All knowledge of the provider's error wording lives here; the retry
//! predicate reuses [`is_rate_limited`].

use crate::error::ErrorKind;

const CREDENTIAL_SIGNATURES: &[&str] = &[
    "api_key_invalid",
    "api key expired",
    "api key not valid",
    "expired",
];

const FORBIDDEN_SIGNATURES: &[&str] = &["403", "forbidden", "permission_denied"];

const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "429",
    "too many requests",
    "quota",
    "rate-limit",
    "rate limit",
    "resource_exhausted",
    "embed_content_free_tier_requests",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub message: String,
}

pub fn classify(raw: &str) -> Classification {
    let lowered = raw.to_lowercase();
    if matches_any(&lowered, CREDENTIAL_SIGNATURES) {
        return Classification {
            kind: ErrorKind::InvalidOrExpiredCredential,
            message: "Google Generative API returned API_KEY_INVALID / expired. Renew the API key in Google Cloud Console, update GEMINI_API_KEY, and restart.".into(),
        };
    }
    if matches_any(&lowered, FORBIDDEN_SIGNATURES) {
        return Classification {
            kind: ErrorKind::Forbidden,
            message: "Google Generative API returned 403 Forbidden. The API key may be invalid or revoked. Rotate the key and update GEMINI_API_KEY.".into(),
        };
    }
    if matches_any(&lowered, RATE_LIMIT_SIGNATURES) {
        return Classification {
            kind: ErrorKind::RateLimited,
            message: "Google Generative API rate limit reached (429). Enable billing, request a higher quota, or reduce request volume.".into(),
        };
    }
    Classification {
        kind: ErrorKind::TransportError,
        message: raw.to_string(),
    }
}

/// Rate-limit and quota signatures, case-insensitive.
pub fn is_rate_limited(raw: &str) -> bool {
    matches_any(&raw.to_lowercase(), RATE_LIMIT_SIGNATURES)
}

fn matches_any(lowered: &str, signatures: &[&str]) -> bool {
    signatures.iter().any(|sig| lowered.contains(sig))
}
