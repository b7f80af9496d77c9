#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a scholarship application during the review lifecycle.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Editable by the owning student; not yet visible to reviewers.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "draft"))]
    Draft,
    /// Handed in; locked for editing, waiting for a reviewer to pick it up.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "submitted"))]
    Submitted,
    /// An admin is actively reviewing the application.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "under_review"))]
    UnderReview,
    /// Passed review; awaiting the final award decision.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "shortlisted"))]
    Shortlisted,
    /// Final: the application was turned down.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
    /// Final: the scholarship was granted.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "awarded"))]
    Awarded,
}

impl ApplicationStatus {
    /// Statuses this one may move forward to.
    ///
    /// Reopening (back to `Draft`) is deliberately not part of this table;
    /// it is a separate administrative edge checked via [`Self::can_reopen`].
    pub fn successors(&self) -> &'static [ApplicationStatus] {
        match self {
            Self::Draft => &[Self::Submitted],
            Self::Submitted => &[Self::UnderReview],
            Self::UnderReview => &[Self::Shortlisted, Self::Rejected],
            Self::Shortlisted => &[Self::Awarded, Self::Rejected],
            Self::Rejected | Self::Awarded => &[],
        }
    }

    /// Returns true if `to` is in the fixed successor set of `from`.
    pub fn is_transition_allowed(from: ApplicationStatus, to: ApplicationStatus) -> bool {
        from.successors().contains(&to)
    }

    /// Returns true if an admin may reopen an application in this status,
    /// returning it to `Draft` outside the forward table.
    pub fn can_reopen(&self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview | Self::Shortlisted)
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Awarded)
    }

    /// All possible status values.
    pub const ALL: &'static [ApplicationStatus] = &[
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::Shortlisted,
        Self::Rejected,
        Self::Awarded,
    ];

    /// Returns the string representation (snake_case, as stored in the database).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Shortlisted => "shortlisted",
            Self::Rejected => "rejected",
            Self::Awarded => "awarded",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            ApplicationStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for ApplicationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "under_review" => Ok(Self::UnderReview),
            "shortlisted" => Ok(Self::Shortlisted),
            "rejected" => Ok(Self::Rejected),
            "awarded" => Ok(Self::Awarded),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn transition_table_is_exhaustive() {
        // Every (from, to) pair, checked against the fixed edge list.
        let allowed: &[(ApplicationStatus, ApplicationStatus)] = &[
            (Draft, Submitted),
            (Submitted, UnderReview),
            (UnderReview, Shortlisted),
            (UnderReview, Rejected),
            (Shortlisted, Awarded),
            (Shortlisted, Rejected),
        ];

        for &from in ApplicationStatus::ALL {
            for &to in ApplicationStatus::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    ApplicationStatus::is_transition_allowed(from, to),
                    expected,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        assert!(Rejected.successors().is_empty());
        assert!(Awarded.successors().is_empty());
        assert!(Rejected.is_terminal());
        assert!(Awarded.is_terminal());
        assert!(!Draft.is_terminal());
    }

    #[test]
    fn reopen_predicate() {
        assert!(Submitted.can_reopen());
        assert!(UnderReview.can_reopen());
        assert!(Shortlisted.can_reopen());

        assert!(!Draft.can_reopen());
        assert!(!Rejected.can_reopen());
        assert!(!Awarded.can_reopen());
    }

    #[test]
    fn rejected_cannot_reenter_review() {
        // Stale admin action: a rejected application must stay rejected.
        assert!(!ApplicationStatus::is_transition_allowed(Rejected, UnderReview));
    }

    #[test]
    fn test_serde_roundtrip() {
        for status in ApplicationStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            let parsed: ApplicationStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(*status, parsed);
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "under_review".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::UnderReview
        );
        assert!("Invalid".parse::<ApplicationStatus>().is_err());
    }
}
