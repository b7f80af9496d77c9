use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::schema::{
    ApplicationFormV2, FORM_SCHEMA_VERSION, FinancialDeclaration, Nationality, SiblingMember,
};

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (clear the field)
/// * JSON field = value => `Some(Some(v))` (set to value)
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Incremental edit to a draft form.
///
/// Merge semantics are deliberately per-sub-entity rather than a generic deep
/// merge: scalar leaves are shallow-overwritten inside each named sub-object,
/// while sibling buckets and the financial declaration are replaced wholesale
/// when present (the client always resends those in full).
#[derive(Clone, Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFormPatch {
    pub personal_info: Option<PersonalInfoPatch>,
    pub family_info: Option<FamilyInfoPatch>,
    /// Replaced wholesale when present.
    pub financial_declaration: Option<FinancialDeclaration>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfoPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub student_id: Option<String>,
    pub nationality: Option<Nationality>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub country_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub campus_option_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub faculty_option_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub course_option_id: Option<Option<i32>>,
    pub current_semester: Option<u32>,
    pub cgpa: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInfoPatch {
    pub father_guardian: Option<GuardianPatch>,
    pub mother_guardian: Option<GuardianPatch>,
    pub siblings: Option<SiblingsPatch>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuardianPatch {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<bool>)]
    pub has_guardian: Option<Option<bool>>,
    pub full_name: Option<String>,
    pub occupation: Option<String>,
    pub monthly_income: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub mobile_number: Option<Option<String>>,
}

/// Buckets are whole-array replacements; only the special-treatment flags
/// merge field-by-field.
#[derive(Clone, Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiblingsPatch {
    pub above18_working: Option<Vec<SiblingMember>>,
    pub above18_non_working: Option<Vec<SiblingMember>>,
    pub study_in_ipt: Option<Vec<SiblingMember>>,
    #[serde(rename = "age7to17")]
    pub age7_to17: Option<Vec<SiblingMember>>,
    pub age6_below: Option<Vec<SiblingMember>>,
    pub special_treatment: Option<SpecialTreatmentPatch>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpecialTreatmentPatch {
    pub has_oku: Option<bool>,
    pub has_chronic_illness: Option<bool>,
}

/// Apply `patch` to `current`, returning the merged document.
///
/// The schema tag is re-asserted; a patch can never change the version.
pub fn merge_form(current: &ApplicationFormV2, patch: ApplicationFormPatch) -> ApplicationFormV2 {
    let mut merged = current.clone();

    if let Some(p) = patch.personal_info {
        let t = &mut merged.personal_info;
        if let Some(v) = p.full_name {
            t.full_name = v;
        }
        if let Some(v) = p.email {
            t.email = v;
        }
        if let Some(v) = p.mobile_number {
            t.mobile_number = v;
        }
        if let Some(v) = p.student_id {
            t.student_id = v;
        }
        if let Some(v) = p.nationality {
            t.nationality = v;
        }
        if let Some(v) = p.country_code {
            t.country_code = v;
        }
        if let Some(v) = p.date_of_birth {
            t.date_of_birth = v;
        }
        if let Some(v) = p.campus_option_id {
            t.campus_option_id = v;
        }
        if let Some(v) = p.faculty_option_id {
            t.faculty_option_id = v;
        }
        if let Some(v) = p.course_option_id {
            t.course_option_id = v;
        }
        if let Some(v) = p.current_semester {
            t.current_semester = v;
        }
        if let Some(v) = p.cgpa {
            t.cgpa = v;
        }
    }

    if let Some(p) = patch.family_info {
        if let Some(g) = p.father_guardian {
            apply_guardian_patch(&mut merged.family_info.father_guardian, g);
        }
        if let Some(g) = p.mother_guardian {
            apply_guardian_patch(&mut merged.family_info.mother_guardian, g);
        }
        if let Some(s) = p.siblings {
            let t = &mut merged.family_info.siblings;
            if let Some(v) = s.above18_working {
                t.above18_working = v;
            }
            if let Some(v) = s.above18_non_working {
                t.above18_non_working = v;
            }
            if let Some(v) = s.study_in_ipt {
                t.study_in_ipt = v;
            }
            if let Some(v) = s.age7_to17 {
                t.age7_to17 = v;
            }
            if let Some(v) = s.age6_below {
                t.age6_below = v;
            }
            if let Some(st) = s.special_treatment {
                if let Some(v) = st.has_oku {
                    t.special_treatment.has_oku = v;
                }
                if let Some(v) = st.has_chronic_illness {
                    t.special_treatment.has_chronic_illness = v;
                }
            }
        }
    }

    if let Some(fin) = patch.financial_declaration {
        merged.financial_declaration = fin;
    }

    merged.schema_version = FORM_SCHEMA_VERSION;
    merged
}

fn apply_guardian_patch(target: &mut super::schema::Guardian, patch: GuardianPatch) {
    if let Some(v) = patch.has_guardian {
        target.has_guardian = v;
    }
    if let Some(v) = patch.full_name {
        target.full_name = v;
    }
    if let Some(v) = patch.occupation {
        target.occupation = v;
    }
    if let Some(v) = patch.monthly_income {
        target.monthly_income = v;
    }
    if let Some(v) = patch.mobile_number {
        target.mobile_number = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_form() -> ApplicationFormV2 {
        let mut form =
            ApplicationFormV2::new_default("Aina Zulkifli", "aina@example.com", "+60123456789");
        form.personal_info.student_id = "1191202045".into();
        form.family_info.siblings.above18_working.push(SiblingMember {
            member_id: "m1".into(),
            full_name: "Farid".into(),
            age: 25,
            monthly_salary: Some(3200.0),
        });
        form.family_info.siblings.age6_below.push(SiblingMember {
            member_id: "m2".into(),
            full_name: "Iman".into(),
            age: 5,
            monthly_salary: None,
        });
        form
    }

    #[test]
    fn empty_patch_is_identity() {
        let form = base_form();
        let merged = merge_form(&form, ApplicationFormPatch::default());
        assert_eq!(merged, form);
        assert_eq!(merged.schema_version, FORM_SCHEMA_VERSION);
    }

    #[test]
    fn single_scalar_patch_leaves_rest_unchanged() {
        let form = base_form();
        let patch: ApplicationFormPatch =
            serde_json::from_value(json!({"personalInfo": {"fullName": "Aina binti Zulkifli"}}))
                .unwrap();

        let merged = merge_form(&form, patch);

        assert_eq!(merged.personal_info.full_name, "Aina binti Zulkifli");
        assert_eq!(merged.personal_info.email, form.personal_info.email);
        assert_eq!(merged.personal_info.student_id, form.personal_info.student_id);
        assert_eq!(merged.family_info, form.family_info);
        assert_eq!(merged.financial_declaration, form.financial_declaration);
    }

    #[test]
    fn null_clears_optional_field() {
        let mut form = base_form();
        form.personal_info.campus_option_id = Some(3);

        let patch: ApplicationFormPatch =
            serde_json::from_value(json!({"personalInfo": {"campusOptionId": null}})).unwrap();
        let merged = merge_form(&form, patch);
        assert_eq!(merged.personal_info.campus_option_id, None);

        // Absent field: no update.
        let patch: ApplicationFormPatch =
            serde_json::from_value(json!({"personalInfo": {"fullName": "X"}})).unwrap();
        let merged = merge_form(&form, patch);
        assert_eq!(merged.personal_info.campus_option_id, Some(3));
    }

    #[test]
    fn sibling_bucket_is_replaced_wholesale() {
        let form = base_form();
        let patch: ApplicationFormPatch = serde_json::from_value(json!({
            "familyInfo": {"siblings": {"above18Working": [
                {"memberId": "m9", "fullName": "Zara", "age": 30, "monthlySalary": 4100.0}
            ]}}
        }))
        .unwrap();

        let merged = merge_form(&form, patch);

        // The patched bucket is exactly the sent array, nothing merged in.
        assert_eq!(merged.family_info.siblings.above18_working.len(), 1);
        assert_eq!(merged.family_info.siblings.above18_working[0].member_id, "m9");
        // Untouched buckets survive.
        assert_eq!(merged.family_info.siblings.age6_below, form.family_info.siblings.age6_below);
    }

    #[test]
    fn financial_declaration_is_replaced_wholesale() {
        let mut form = base_form();
        form.financial_declaration.bank_name = "Maybank".into();

        let patch: ApplicationFormPatch = serde_json::from_value(json!({
            "financialDeclaration": {
                "bankName": "CIMB",
                "bankAccountNumber": "800123456",
                "outstandingInvoiceAmount": 1250.5,
                "receivingOtherSupport": true,
                "supportProviderOptionIds": [7]
            }
        }))
        .unwrap();

        let merged = merge_form(&form, patch);
        assert_eq!(merged.financial_declaration.bank_name, "CIMB");
        assert_eq!(merged.financial_declaration.support_provider_option_ids, vec![7]);
    }

    #[test]
    fn guardian_flag_can_be_cleared_to_absent() {
        let form = base_form();
        let patch: ApplicationFormPatch = serde_json::from_value(json!({
            "familyInfo": {"fatherGuardian": {"hasGuardian": false}}
        }))
        .unwrap();

        let merged = merge_form(&form, patch);
        assert!(!merged.family_info.father_guardian.is_present());
        assert!(merged.family_info.mother_guardian.is_present());
    }

    #[test]
    fn patch_cannot_change_schema_version() {
        let form = base_form();
        let merged = merge_form(&form, ApplicationFormPatch::default());
        assert_eq!(merged.schema_version, 2);
    }
}
