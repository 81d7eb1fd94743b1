use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const OPEN_TAG: &str = "<verdict>";
const CLOSE_TAG: &str = "</verdict>";

/// The model's judgement of the respondent's latest answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Verdict {
    /// The answer meets the criteria; move to the next question
    Accept {
        #[serde(default)]
        rationale: String,
    },
    /// The answer falls short; re-pose the same question
    Clarify {
        #[serde(default)]
        rationale: String,
    },
}

#[derive(Error, Debug)]
pub enum VerdictParseError {
    #[error("No verdict marker found in reply")]
    NoVerdictFound,

    #[error("Ambiguous verdict: both accept and clarify markers found")]
    AmbiguousVerdict,

    #[error("Failed to parse verdict JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid verdict format: {0}")]
    InvalidFormat(String),
}

/// A model reply split into the verdict and the text meant for the respondent
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub verdict: Verdict,
    pub message: String,
    /// Whether the verdict came from a well-formed verdict block
    pub structured: bool,
}

impl Verdict {
    /// Split a model reply into verdict and respondent-facing message.
    ///
    /// Expected format at the start of the reply:
    /// ```text
    /// <verdict>{"type": "accept", "rationale": "mentions 42"}</verdict>
    /// Thanks! Next, ...
    /// ```
    /// Falls back to phrase markers, then to `Accept`.
    pub fn parse(reply: &str) -> ParsedReply {
        debug!(reply_len = reply.len(), "Parsing verdict");

        match Self::parse_verdict_block(reply) {
            Ok(Some((verdict, message))) => {
                return ParsedReply {
                    verdict,
                    message,
                    structured: true,
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Malformed verdict block, falling back to markers"),
        }

        let message = Self::strip_block(reply);
        let verdict = match Self::parse_simple_markers(&message) {
            Ok(verdict) => verdict,
            Err(VerdictParseError::AmbiguousVerdict) => {
                warn!("Ambiguous verdict markers, holding the question");
                Verdict::Clarify {
                    rationale: "ambiguous verdict markers".into(),
                }
            }
            Err(_) => Verdict::Accept {
                rationale: String::new(),
            },
        };

        ParsedReply {
            verdict,
            message: Self::strip_markers(&message),
            structured: false,
        }
    }

    fn parse_verdict_block(reply: &str) -> Result<Option<(Self, String)>, VerdictParseError> {
        let start = reply.find(OPEN_TAG);
        let end = reply.find(CLOSE_TAG);

        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                let json_str = reply[start + OPEN_TAG.len()..end].trim();
                debug!(json = json_str, "Found verdict block");
                let verdict: Verdict = serde_json::from_str(json_str)?;
                let message = format!("{}{}", &reply[..start], &reply[end + CLOSE_TAG.len()..]);
                Ok(Some((verdict, message.trim().to_string())))
            }
            (Some(_), Some(_)) => Err(VerdictParseError::InvalidFormat(
                "Malformed verdict block".to_string(),
            )),
            (Some(_), None) => Err(VerdictParseError::InvalidFormat(
                "Unterminated verdict block".to_string(),
            )),
            _ => Ok(None),
        }
    }

    fn parse_simple_markers(message: &str) -> Result<Self, VerdictParseError> {
        let lower = message.to_lowercase();

        let clarify_markers = ["[clarify]", "provide more details", "could you please"];
        let accept_markers = ["[accept]"];

        let has_clarify = clarify_markers.iter().any(|m| lower.contains(m));
        let has_accept = accept_markers.iter().any(|m| lower.contains(m));

        match (has_accept, has_clarify) {
            (true, false) => {
                debug!("Parsed as ACCEPT via simple markers");
                Ok(Verdict::Accept {
                    rationale: "accepted (marker)".into(),
                })
            }
            (false, true) => {
                debug!("Parsed as CLARIFY via simple markers");
                Ok(Verdict::Clarify {
                    rationale: "clarification requested (marker)".into(),
                })
            }
            (true, true) => Err(VerdictParseError::AmbiguousVerdict),
            (false, false) => Err(VerdictParseError::NoVerdictFound),
        }
    }

    /// Remove any (possibly broken) verdict tags so they never reach the respondent
    fn strip_block(reply: &str) -> String {
        let stripped = match (reply.find(OPEN_TAG), reply.find(CLOSE_TAG)) {
            (Some(start), Some(end)) if start < end => {
                format!("{}{}", &reply[..start], &reply[end + CLOSE_TAG.len()..])
            }
            (Some(start), _) => reply[..start].to_string(),
            (None, Some(end)) => reply[end + CLOSE_TAG.len()..].to_string(),
            (None, None) => reply.to_string(),
        };
        stripped.trim().to_string()
    }

    fn strip_markers(message: &str) -> String {
        message
            .replace("[CLARIFY]", "")
            .replace("[ACCEPT]", "")
            .trim()
            .to_string()
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }

    pub fn is_clarify(&self) -> bool {
        matches!(self, Verdict::Clarify { .. })
    }

    pub fn rationale(&self) -> &str {
        match self {
            Verdict::Accept { rationale } | Verdict::Clarify { rationale } => rationale,
        }
    }

    /// Short description for logging
    pub fn short_description(&self) -> &'static str {
        match self {
            Verdict::Accept { .. } => "ACCEPT",
            Verdict::Clarify { .. } => "CLARIFY",
        }
    }
}
