//! FHIR OperationOutcome envelope for HTTP error responses.
//!
//! The pseudonymized search endpoint reports failures as a JSON
//! OperationOutcome: an envelope with an `issue` list, each issue carrying a
//! machine-readable `code`. The codes form a closed vocabulary:
//!
//! - `not-allowed`: the HTTP method is not accepted
//! - `required`: a mandatory parameter was missing
//! - `not-found`: no record matched the supplied identifier

use serde::{Deserialize, Serialize};

/// Severity of a reported issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Information,
}

/// Closed vocabulary of issue codes emitted by the management interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCode {
    #[serde(rename = "not-allowed")]
    NotAllowed,
    #[serde(rename = "required")]
    Required,
    #[serde(rename = "not-found")]
    NotFound,
}

impl IssueCode {
    /// The wire form of this code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotAllowed => "not-allowed",
            Self::Required => "required",
            Self::NotFound => "not-found",
        }
    }
}

/// A single issue within an [`OperationOutcome`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeIssue {
    pub severity: IssueSeverity,
    pub code: IssueCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// JSON envelope describing why a request failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub issue: Vec<OutcomeIssue>,
}

impl OperationOutcome {
    /// Builds an outcome carrying a single error-severity issue.
    pub fn error(code: IssueCode, diagnostics: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue: vec![OutcomeIssue {
                severity: IssueSeverity::Error,
                code,
                diagnostics: Some(diagnostics.into()),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_single_issue_envelope() {
        let outcome = OperationOutcome::error(IssueCode::Required, "parameter is required");
        let json = serde_json::to_value(&outcome).expect("serialize outcome");

        assert_eq!(json["resourceType"], "OperationOutcome");
        assert_eq!(json["issue"][0]["severity"], "error");
        assert_eq!(json["issue"][0]["code"], "required");
        assert_eq!(json["issue"][0]["diagnostics"], "parameter is required");
    }

    #[test]
    fn issue_codes_use_hyphenated_wire_form() {
        for (code, wire) in [
            (IssueCode::NotAllowed, "not-allowed"),
            (IssueCode::Required, "required"),
            (IssueCode::NotFound, "not-found"),
        ] {
            assert_eq!(code.as_str(), wire);
            let json = serde_json::to_string(&code).expect("serialize code");
            assert_eq!(json, format!("\"{wire}\""));
        }
    }

    #[test]
    fn deserialises_round_trip() {
        let outcome = OperationOutcome::error(IssueCode::NotFound, "no match");
        let json = serde_json::to_string(&outcome).expect("serialize outcome");
        let back: OperationOutcome = serde_json::from_str(&json).expect("deserialize outcome");
        assert_eq!(back, outcome);
    }
}
