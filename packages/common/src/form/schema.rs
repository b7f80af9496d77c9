use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Schema tag of the current form shape. Payloads carrying any other tag are
/// legacy documents: readable for display, rejected for mutation.
pub const FORM_SCHEMA_VERSION: u32 = 2;

/// The versioned application form document, persisted as JSON.
///
/// Field names on the wire (and in the stored payload) are camelCase; this is
/// the contract with the form client and with the slot-key vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFormV2 {
    /// Always [`FORM_SCHEMA_VERSION`] for this shape.
    pub schema_version: u32,
    pub personal_info: PersonalInfo,
    pub family_info: FamilyInfo,
    pub financial_declaration: FinancialDeclaration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Nationality {
    Malaysian,
    International,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub mobile_number: String,
    /// University student number.
    pub student_id: String,
    pub nationality: Nationality,
    /// ISO country code, required iff nationality is not Malaysian.
    pub country_code: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub campus_option_id: Option<i32>,
    pub faculty_option_id: Option<i32>,
    pub course_option_id: Option<i32>,
    pub current_semester: u32,
    pub cgpa: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInfo {
    pub father_guardian: Guardian,
    pub mother_guardian: Guardian,
    pub siblings: Siblings,
}

/// One parent or guardian record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Guardian {
    /// Tri-state on the wire: absent/None and Some(true) both mean the
    /// guardian is present; only an explicit `false` marks them absent.
    pub has_guardian: Option<bool>,
    pub full_name: String,
    pub occupation: String,
    pub monthly_income: f64,
    pub mobile_number: Option<String>,
}

impl Guardian {
    /// Present unless explicitly flagged `false`.
    pub fn is_present(&self) -> bool {
        self.has_guardian != Some(false)
    }
}

/// Dependant buckets. Each sibling lives in exactly one bucket; the client
/// always resends a bucket's full array, so merge replaces buckets wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Siblings {
    pub above18_working: Vec<SiblingMember>,
    pub above18_non_working: Vec<SiblingMember>,
    pub study_in_ipt: Vec<SiblingMember>,
    #[serde(rename = "age7to17")]
    pub age7_to17: Vec<SiblingMember>,
    pub age6_below: Vec<SiblingMember>,
    pub special_treatment: SpecialTreatment,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiblingMember {
    /// Server-generated id; ties the member to its attachment slot keys.
    #[serde(default)]
    pub member_id: String,
    pub full_name: String,
    pub age: u32,
    /// Only meaningful in the `above18Working` bucket.
    pub monthly_salary: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpecialTreatment {
    pub has_oku: bool,
    pub has_chronic_illness: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialDeclaration {
    pub bank_name: String,
    pub bank_account_number: String,
    /// Outstanding university invoice balance, in whole currency units.
    pub outstanding_invoice_amount: f64,
    pub receiving_other_support: bool,
    /// Active `support_provider` option ids; must be non-empty iff
    /// `receiving_other_support` is set.
    pub support_provider_option_ids: Vec<i32>,
}

/// The five sibling buckets, in canonical (slot-key) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SiblingBucket {
    Above18Working,
    Above18NonWorking,
    StudyInIpt,
    Age7To17,
    Age6Below,
}

impl SiblingBucket {
    pub const ALL: &'static [SiblingBucket] = &[
        Self::Above18Working,
        Self::Above18NonWorking,
        Self::StudyInIpt,
        Self::Age7To17,
        Self::Age6Below,
    ];

    /// Wire name, as used in payload keys and slot keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above18Working => "above18Working",
            Self::Above18NonWorking => "above18NonWorking",
            Self::StudyInIpt => "studyInIpt",
            Self::Age7To17 => "age7to17",
            Self::Age6Below => "age6Below",
        }
    }
}

impl Siblings {
    pub fn bucket(&self, bucket: SiblingBucket) -> &[SiblingMember] {
        match bucket {
            SiblingBucket::Above18Working => &self.above18_working,
            SiblingBucket::Above18NonWorking => &self.above18_non_working,
            SiblingBucket::StudyInIpt => &self.study_in_ipt,
            SiblingBucket::Age7To17 => &self.age7_to17,
            SiblingBucket::Age6Below => &self.age6_below,
        }
    }

    fn bucket_mut(&mut self, bucket: SiblingBucket) -> &mut Vec<SiblingMember> {
        match bucket {
            SiblingBucket::Above18Working => &mut self.above18_working,
            SiblingBucket::Above18NonWorking => &mut self.above18_non_working,
            SiblingBucket::StudyInIpt => &mut self.study_in_ipt,
            SiblingBucket::Age7To17 => &mut self.age7_to17,
            SiblingBucket::Age6Below => &mut self.age6_below,
        }
    }

    /// Generate member ids for entries the client sent without one.
    pub fn assign_member_ids(&mut self) {
        for &bucket in SiblingBucket::ALL {
            for member in self.bucket_mut(bucket) {
                if member.member_id.is_empty() {
                    member.member_id = Uuid::new_v4().simple().to_string();
                }
            }
        }
    }
}

impl ApplicationFormV2 {
    /// A fully-populated default document: numeric fields zeroed, collections
    /// empty, guardians defaulted to present with placeholder values.
    pub fn new_default(full_name: &str, email: &str, mobile_number: &str) -> Self {
        let empty_guardian = Guardian {
            has_guardian: Some(true),
            full_name: String::new(),
            occupation: String::new(),
            monthly_income: 0.0,
            mobile_number: None,
        };

        Self {
            schema_version: FORM_SCHEMA_VERSION,
            personal_info: PersonalInfo {
                full_name: full_name.to_string(),
                email: email.to_string(),
                mobile_number: mobile_number.to_string(),
                student_id: String::new(),
                nationality: Nationality::Malaysian,
                country_code: None,
                date_of_birth: None,
                campus_option_id: None,
                faculty_option_id: None,
                course_option_id: None,
                current_semester: 0,
                cgpa: 0.0,
            },
            family_info: FamilyInfo {
                father_guardian: empty_guardian.clone(),
                mother_guardian: empty_guardian,
                siblings: Siblings {
                    above18_working: Vec::new(),
                    above18_non_working: Vec::new(),
                    study_in_ipt: Vec::new(),
                    age7_to17: Vec::new(),
                    age6_below: Vec::new(),
                    special_treatment: SpecialTreatment {
                        has_oku: false,
                        has_chronic_illness: false,
                    },
                },
            },
            financial_declaration: FinancialDeclaration {
                bank_name: String::new(),
                bank_account_number: String::new(),
                outstanding_invoice_amount: 0.0,
                receiving_other_support: false,
                support_provider_option_ids: Vec::new(),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Structural tag check: is this stored payload the current shape?
pub fn is_application_form_v2(payload: &Value) -> bool {
    payload.get("schemaVersion").and_then(Value::as_u64) == Some(FORM_SCHEMA_VERSION as u64)
}

/// A stored form payload, discriminated by its `schemaVersion` tag.
///
/// Legacy payloads are kept readable for display but every mutation path
/// must refuse them; the draft has to be discarded and recreated first.
#[derive(Clone, Debug, PartialEq)]
pub enum FormPayload {
    V2(ApplicationFormV2),
    Legacy(Value),
}

impl FormPayload {
    pub fn from_value(payload: Value) -> Result<Self, serde_json::Error> {
        if is_application_form_v2(&payload) {
            Ok(Self::V2(serde_json::from_value(payload)?))
        } else {
            Ok(Self::Legacy(payload))
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_form_is_v2() {
        let form = ApplicationFormV2::new_default("Aina Zulkifli", "aina@example.com", "+60123456789");
        assert!(is_application_form_v2(&form.to_value()));
        assert_eq!(form.schema_version, FORM_SCHEMA_VERSION);
        assert_eq!(form.personal_info.full_name, "Aina Zulkifli");
        assert!(form.family_info.father_guardian.is_present());
        assert!(form.family_info.siblings.above18_working.is_empty());
        assert_eq!(form.financial_declaration.outstanding_invoice_amount, 0.0);
    }

    #[test]
    fn wire_casing_is_camel_case() {
        let form = ApplicationFormV2::new_default("A", "a@b.c", "+60123456789");
        let value = form.to_value();
        assert!(value.get("personalInfo").is_some());
        assert!(value["familyInfo"]["siblings"].get("age7to17").is_some());
        assert!(value["familyInfo"]["siblings"].get("above18NonWorking").is_some());
        assert!(value["financialDeclaration"]
            .get("supportProviderOptionIds")
            .is_some());
    }

    #[test]
    fn classify_v2_and_legacy() {
        let form = ApplicationFormV2::new_default("A", "a@b.c", "+60123456789");
        let payload = FormPayload::from_value(form.to_value()).unwrap();
        assert!(matches!(payload, FormPayload::V2(_)));

        let legacy = json!({"schemaVersion": 1, "name": "old shape"});
        let payload = FormPayload::from_value(legacy.clone()).unwrap();
        assert_eq!(payload, FormPayload::Legacy(legacy));

        let untagged = json!({"anything": true});
        assert!(FormPayload::from_value(untagged).unwrap().is_legacy());
    }

    #[test]
    fn corrupt_v2_payload_is_an_error() {
        // Tagged as v2 but structurally wrong: surfaced, not silently accepted.
        let bad = json!({"schemaVersion": 2, "personalInfo": "not an object"});
        assert!(FormPayload::from_value(bad).is_err());
    }

    #[test]
    fn assign_member_ids_fills_only_missing() {
        let mut form = ApplicationFormV2::new_default("A", "a@b.c", "+60123456789");
        form.family_info.siblings.above18_working.push(SiblingMember {
            member_id: "keep-me".into(),
            full_name: "Farid".into(),
            age: 24,
            monthly_salary: Some(2500.0),
        });
        form.family_info.siblings.age6_below.push(SiblingMember {
            member_id: String::new(),
            full_name: "Iman".into(),
            age: 4,
            monthly_salary: None,
        });

        form.family_info.siblings.assign_member_ids();

        assert_eq!(form.family_info.siblings.above18_working[0].member_id, "keep-me");
        assert!(!form.family_info.siblings.age6_below[0].member_id.is_empty());
    }

    #[test]
    fn guardian_flag_defaults_to_present()  {
        let guardian = Guardian {
            has_guardian: None,
            full_name: String::new(),
            occupation: String::new(),
            monthly_income: 0.0,
            mobile_number: None,
        };
        assert!(guardian.is_present());
        assert!(!Guardian { has_guardian: Some(false), ..guardian }.is_present());
    }
}
