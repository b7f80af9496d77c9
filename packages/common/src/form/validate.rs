use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{Months, NaiveDate};
use regex::Regex;

use super::schema::{ApplicationFormV2, Guardian, Nationality, SiblingBucket};

/// Upper bound for every monetary and numeric field in the form.
pub const NUMERIC_FIELD_MAX: f64 = 10_000_000.0;

/// Youngest allowed applicant, in years.
pub const MINIMUM_APPLICANT_AGE_YEARS: u32 = 15;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern compiles"));

static MEMBER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("member id pattern compiles"));

/// A cross-field or bounds violation in the application form.
///
/// Always reported to the caller; the form is never silently corrected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("{field} is not a valid phone number")]
    InvalidPhone { field: &'static str },
    #[error("{field} must be between 0 and {max}", max = NUMERIC_FIELD_MAX)]
    OutOfRange { field: &'static str },
    #[error("country code is required for non-Malaysian applicants")]
    CountryCodeRequired,
    #[error("country code must be empty for Malaysian applicants")]
    CountryCodeForbidden,
    #[error("at least one support provider must be selected when receiving other support")]
    SupportProvidersRequired,
    #[error("support providers must be empty when not receiving other support")]
    SupportProvidersForbidden,
    #[error("applicant must be at least {MINIMUM_APPLICANT_AGE_YEARS} years old")]
    UnderMinimumAge,
    #[error("sibling '{member_id}' carries a salary outside the working bucket")]
    UnexpectedSiblingSalary { member_id: String },
    #[error("duplicate sibling member id '{member_id}'")]
    DuplicateMemberId { member_id: String },
}

/// Strip the separators clients habitually type into phone fields.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '(' | ')' | '-'))
        .collect()
}

fn check_phone(field: &'static str, raw: &str) -> Result<(), ValidationError> {
    if !PHONE_RE.is_match(&normalize_phone(raw)) {
        return Err(ValidationError::InvalidPhone { field });
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 || value > NUMERIC_FIELD_MAX {
        return Err(ValidationError::OutOfRange { field });
    }
    Ok(())
}

fn check_required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if value.chars().count() > 256 {
        return Err(ValidationError::InvalidField {
            field,
            reason: "must be at most 256 characters".into(),
        });
    }
    Ok(())
}

fn check_guardian(name: &'static str, guardian: &Guardian) -> Result<(), ValidationError> {
    if !guardian.is_present() {
        return Ok(());
    }
    check_range("familyInfo guardian monthlyIncome", guardian.monthly_income)?;
    if let Some(ref mobile) = guardian.mobile_number
        && !mobile.trim().is_empty()
    {
        check_phone(name, mobile)?;
    }
    Ok(())
}

/// Validate a complete form for submission.
///
/// `today` is passed in so the age rule is deterministic under test; callers
/// use the current date.
pub fn validate_form(form: &ApplicationFormV2, today: NaiveDate) -> Result<(), ValidationError> {
    let personal = &form.personal_info;

    check_required("personalInfo.fullName", &personal.full_name)?;
    check_required("personalInfo.email", &personal.email)?;
    if !personal.email.contains('@') {
        return Err(ValidationError::InvalidField {
            field: "personalInfo.email",
            reason: "must be an email address".into(),
        });
    }
    check_required("personalInfo.studentId", &personal.student_id)?;
    check_phone("personalInfo.mobileNumber", &personal.mobile_number)?;

    match (personal.nationality, personal.country_code.as_deref()) {
        (Nationality::International, None | Some("")) => {
            return Err(ValidationError::CountryCodeRequired);
        }
        (Nationality::Malaysian, Some(code)) if !code.is_empty() => {
            return Err(ValidationError::CountryCodeForbidden);
        }
        _ => {}
    }

    check_range("personalInfo.currentSemester", personal.current_semester as f64)?;
    check_range("personalInfo.cgpa", personal.cgpa)?;

    if let Some(dob) = personal.date_of_birth {
        let cutoff = today
            .checked_sub_months(Months::new(MINIMUM_APPLICANT_AGE_YEARS * 12))
            .unwrap_or(today);
        if dob > cutoff {
            return Err(ValidationError::UnderMinimumAge);
        }
    }

    check_guardian("familyInfo.fatherGuardian.mobileNumber", &form.family_info.father_guardian)?;
    check_guardian("familyInfo.motherGuardian.mobileNumber", &form.family_info.mother_guardian)?;

    let siblings = &form.family_info.siblings;
    let mut seen_member_ids: HashSet<&str> = HashSet::new();
    for &bucket in SiblingBucket::ALL {
        for member in siblings.bucket(bucket) {
            if !MEMBER_ID_RE.is_match(&member.member_id) {
                return Err(ValidationError::InvalidField {
                    field: "familyInfo.siblings",
                    reason: format!("member id '{}' is not valid", member.member_id),
                });
            }
            if !seen_member_ids.insert(member.member_id.as_str()) {
                return Err(ValidationError::DuplicateMemberId {
                    member_id: member.member_id.clone(),
                });
            }
            check_required("familyInfo.siblings fullName", &member.full_name)?;
            check_range("familyInfo.siblings age", member.age as f64)?;
            match member.monthly_salary {
                Some(salary) if bucket == SiblingBucket::Above18Working => {
                    check_range("familyInfo.siblings monthlySalary", salary)?;
                }
                Some(_) => {
                    return Err(ValidationError::UnexpectedSiblingSalary {
                        member_id: member.member_id.clone(),
                    });
                }
                None => {}
            }
        }
    }

    let financial = &form.financial_declaration;
    check_required("financialDeclaration.bankName", &financial.bank_name)?;
    check_required("financialDeclaration.bankAccountNumber", &financial.bank_account_number)?;
    check_range(
        "financialDeclaration.outstandingInvoiceAmount",
        financial.outstanding_invoice_amount,
    )?;

    match (financial.receiving_other_support, financial.support_provider_option_ids.len()) {
        (true, 0) => return Err(ValidationError::SupportProvidersRequired),
        (false, n) if n > 0 => return Err(ValidationError::SupportProvidersForbidden),
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::schema::{ApplicationFormV2, SiblingMember};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
    }

    fn valid_form() -> ApplicationFormV2 {
        let mut form =
            ApplicationFormV2::new_default("Aina Zulkifli", "aina@example.com", "+60 12-345 6789");
        form.personal_info.student_id = "1191202045".into();
        form.personal_info.date_of_birth = NaiveDate::from_ymd_opt(2004, 3, 14);
        form.financial_declaration.bank_name = "Maybank".into();
        form.financial_declaration.bank_account_number = "800123456".into();
        form
    }

    #[test]
    fn accepts_a_complete_form() {
        assert_eq!(validate_form(&valid_form(), today()), Ok(()));
    }

    #[test]
    fn phone_normalization_strips_separators() {
        assert_eq!(normalize_phone("+60 (12) 345-6789"), "+60123456789");
        assert!(check_phone("f", "+60 (12) 345-6789").is_ok());
        assert!(check_phone("f", "not a phone").is_err());
        assert!(check_phone("f", "+60 12").is_err()); // too short
    }

    #[test]
    fn non_malaysian_requires_country_code() {
        let mut form = valid_form();
        form.personal_info.nationality = Nationality::International;
        form.personal_info.country_code = None;
        assert_eq!(
            validate_form(&form, today()),
            Err(ValidationError::CountryCodeRequired)
        );

        form.personal_info.country_code = Some("ID".into());
        assert_eq!(validate_form(&form, today()), Ok(()));
    }

    #[test]
    fn malaysian_must_not_carry_country_code() {
        let mut form = valid_form();
        form.personal_info.country_code = Some("MY".into());
        assert_eq!(
            validate_form(&form, today()),
            Err(ValidationError::CountryCodeForbidden)
        );
    }

    #[test]
    fn support_toggle_cross_check() {
        let mut form = valid_form();
        form.financial_declaration.receiving_other_support = true;
        assert_eq!(
            validate_form(&form, today()),
            Err(ValidationError::SupportProvidersRequired)
        );

        form.financial_declaration.support_provider_option_ids = vec![7];
        assert_eq!(validate_form(&form, today()), Ok(()));

        form.financial_declaration.receiving_other_support = false;
        assert_eq!(
            validate_form(&form, today()),
            Err(ValidationError::SupportProvidersForbidden)
        );
    }

    #[test]
    fn monetary_bounds() {
        let mut form = valid_form();
        form.financial_declaration.outstanding_invoice_amount = 10_000_001.0;
        assert!(matches!(
            validate_form(&form, today()),
            Err(ValidationError::OutOfRange { .. })
        ));

        form.financial_declaration.outstanding_invoice_amount = -1.0;
        assert!(matches!(
            validate_form(&form, today()),
            Err(ValidationError::OutOfRange { .. })
        ));

        form.financial_declaration.outstanding_invoice_amount = 10_000_000.0;
        assert_eq!(validate_form(&form, today()), Ok(()));
    }

    #[test]
    fn minimum_age_lookback() {
        let mut form = valid_form();
        // Fifteenth birthday is today: allowed.
        form.personal_info.date_of_birth = NaiveDate::from_ymd_opt(2011, 8, 6);
        assert_eq!(validate_form(&form, today()), Ok(()));

        // A day younger: rejected.
        form.personal_info.date_of_birth = NaiveDate::from_ymd_opt(2011, 8, 7);
        assert_eq!(
            validate_form(&form, today()),
            Err(ValidationError::UnderMinimumAge)
        );

        // No date of birth on file: rule does not apply.
        form.personal_info.date_of_birth = None;
        assert_eq!(validate_form(&form, today()), Ok(()));
    }

    #[test]
    fn salary_only_in_working_bucket() {
        let mut form = valid_form();
        form.family_info.siblings.age7_to17.push(SiblingMember {
            member_id: "m1".into(),
            full_name: "Iman".into(),
            age: 12,
            monthly_salary: Some(100.0),
        });
        assert!(matches!(
            validate_form(&form, today()),
            Err(ValidationError::UnexpectedSiblingSalary { .. })
        ));
    }

    #[test]
    fn duplicate_member_ids_rejected() {
        let mut form = valid_form();
        for bucket_push in [0, 1] {
            let member = SiblingMember {
                member_id: "dup".into(),
                full_name: "X".into(),
                age: 20,
                monthly_salary: None,
            };
            if bucket_push == 0 {
                form.family_info.siblings.above18_non_working.push(member);
            } else {
                form.family_info.siblings.study_in_ipt.push(member);
            }
        }
        assert_eq!(
            validate_form(&form, today()),
            Err(ValidationError::DuplicateMemberId { member_id: "dup".into() })
        );
    }

    #[test]
    fn absent_guardian_skips_guardian_checks() {
        let mut form = valid_form();
        form.family_info.father_guardian.has_guardian = Some(false);
        form.family_info.father_guardian.monthly_income = -5.0; // would fail if checked
        assert_eq!(validate_form(&form, today()), Ok(()));
    }
}
