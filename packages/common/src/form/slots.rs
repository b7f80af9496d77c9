use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::schema::{ApplicationFormV2, SiblingBucket};

/// The closed slot-key vocabulary. Anything outside this grammar is rejected
/// at the boundary, before the resolver or any storage lookup runs.
static SLOT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^(?:
            personal\.(?:studentIdProof|latestTranscript)
          | family\.(?:fatherGuardian|motherGuardian)\.payslip
          | family\.specialTreatment\.(?:okuCard|chronicIllnessDoc)
          | siblings\.above18Working\.[A-Za-z0-9_-]{1,64}\.(?:icDoc|payslip)
          | siblings\.(?:above18NonWorking|studyInIpt|age7to17|age6Below)\.[A-Za-z0-9_-]{1,64}\.icDoc
          | financial\.(?:mmuOutstandingInvoice|support\.[0-9]{1,10}\.proof)
        )$",
    )
    .expect("slot key pattern compiles")
});

/// A validated document-upload slot identifier.
///
/// Slot keys are derived from form content on the server; clients may only
/// echo them back. Construct via the typed helpers or [`SlotKey::parse`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey(String);

/// Error when parsing a string that is not in the slot-key vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid attachment slot key")]
pub struct SlotKeyError(pub String);

impl SlotKey {
    pub fn parse(s: &str) -> Result<Self, SlotKeyError> {
        if SLOT_KEY_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(SlotKeyError(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn student_id_proof() -> Self {
        Self("personal.studentIdProof".into())
    }

    pub fn latest_transcript() -> Self {
        Self("personal.latestTranscript".into())
    }

    pub fn outstanding_invoice() -> Self {
        Self("financial.mmuOutstandingInvoice".into())
    }

    pub fn father_payslip() -> Self {
        Self("family.fatherGuardian.payslip".into())
    }

    pub fn mother_payslip() -> Self {
        Self("family.motherGuardian.payslip".into())
    }

    pub fn oku_card() -> Self {
        Self("family.specialTreatment.okuCard".into())
    }

    pub fn chronic_illness_doc() -> Self {
        Self("family.specialTreatment.chronicIllnessDoc".into())
    }

    /// IC document for a sibling in any bucket. The member id must already
    /// satisfy the member-id grammar (enforced by form validation).
    pub fn sibling_ic_doc(bucket: SiblingBucket, member_id: &str) -> Self {
        Self(format!("siblings.{}.{}.icDoc", bucket.as_str(), member_id))
    }

    /// Payslip slot; only siblings in the working bucket carry one.
    pub fn sibling_payslip(member_id: &str) -> Self {
        Self(format!(
            "siblings.{}.{}.payslip",
            SiblingBucket::Above18Working.as_str(),
            member_id
        ))
    }

    pub fn support_proof(provider_id: i32) -> Self {
        Self(format!("financial.support.{provider_id}.proof"))
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the set of mandatory upload slots from form content.
///
/// Pure function of the form value; identical input yields an identical set.
pub fn required_attachment_slots(form: &ApplicationFormV2) -> BTreeSet<SlotKey> {
    let mut slots = BTreeSet::new();

    slots.insert(SlotKey::student_id_proof());
    slots.insert(SlotKey::latest_transcript());
    slots.insert(SlotKey::outstanding_invoice());

    if form.family_info.father_guardian.is_present() {
        slots.insert(SlotKey::father_payslip());
    }
    if form.family_info.mother_guardian.is_present() {
        slots.insert(SlotKey::mother_payslip());
    }

    let siblings = &form.family_info.siblings;
    for &bucket in SiblingBucket::ALL {
        for member in siblings.bucket(bucket) {
            slots.insert(SlotKey::sibling_ic_doc(bucket, &member.member_id));
            if bucket == SiblingBucket::Above18Working {
                slots.insert(SlotKey::sibling_payslip(&member.member_id));
            }
        }
    }

    if siblings.special_treatment.has_oku {
        slots.insert(SlotKey::oku_card());
    }
    if siblings.special_treatment.has_chronic_illness {
        slots.insert(SlotKey::chronic_illness_doc());
    }

    let financial = &form.financial_declaration;
    if financial.receiving_other_support {
        for &provider_id in &financial.support_provider_option_ids {
            slots.insert(SlotKey::support_proof(provider_id));
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::schema::{ApplicationFormV2, SiblingMember};

    fn bare_form() -> ApplicationFormV2 {
        let mut form = ApplicationFormV2::new_default("A", "a@b.c", "+60123456789");
        form.family_info.father_guardian.has_guardian = Some(false);
        form.family_info.mother_guardian.has_guardian = Some(false);
        form
    }

    #[test]
    fn minimal_form_requires_exactly_the_three_base_slots() {
        let slots = required_attachment_slots(&bare_form());
        let keys: Vec<&str> = slots.iter().map(SlotKey::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "financial.mmuOutstandingInvoice",
                "personal.latestTranscript",
                "personal.studentIdProof",
            ]
        );
    }

    #[test]
    fn guardian_flags_gate_payslip_slots() {
        let mut form = bare_form();
        // Absent flag defaults to present.
        form.family_info.father_guardian.has_guardian = None;
        let slots = required_attachment_slots(&form);
        assert!(slots.contains(&SlotKey::father_payslip()));
        assert!(!slots.contains(&SlotKey::mother_payslip()));

        form.family_info.mother_guardian.has_guardian = Some(true);
        let slots = required_attachment_slots(&form);
        assert!(slots.contains(&SlotKey::mother_payslip()));
    }

    #[test]
    fn working_sibling_adds_exactly_two_slots() {
        let mut form = bare_form();
        let before = required_attachment_slots(&form);

        form.family_info.siblings.above18_working.push(SiblingMember {
            member_id: "m42".into(),
            full_name: "Farid".into(),
            age: 24,
            monthly_salary: Some(2800.0),
        });
        let after = required_attachment_slots(&form);

        let added: Vec<SlotKey> = after.difference(&before).cloned().collect();
        assert_eq!(
            added,
            vec![
                SlotKey::parse("siblings.above18Working.m42.icDoc").unwrap(),
                SlotKey::parse("siblings.above18Working.m42.payslip").unwrap(),
            ]
        );
    }

    #[test]
    fn non_working_sibling_adds_only_ic_doc() {
        let mut form = bare_form();
        form.family_info.siblings.age7_to17.push(SiblingMember {
            member_id: "kid1".into(),
            full_name: "Iman".into(),
            age: 10,
            monthly_salary: None,
        });
        let slots = required_attachment_slots(&form);
        assert!(slots.contains(&SlotKey::parse("siblings.age7to17.kid1.icDoc").unwrap()));
        assert!(!slots.iter().any(|s| s.as_str().ends_with("kid1.payslip")));
    }

    #[test]
    fn special_treatment_flags() {
        let mut form = bare_form();
        form.family_info.siblings.special_treatment.has_oku = true;
        form.family_info.siblings.special_treatment.has_chronic_illness = true;
        let slots = required_attachment_slots(&form);
        assert!(slots.contains(&SlotKey::oku_card()));
        assert!(slots.contains(&SlotKey::chronic_illness_doc()));
    }

    #[test]
    fn support_provider_toggle() {
        let mut form = bare_form();
        form.financial_declaration.receiving_other_support = true;
        form.financial_declaration.support_provider_option_ids = vec![7, 12];
        let slots = required_attachment_slots(&form);
        assert!(slots.contains(&SlotKey::support_proof(7)));
        assert!(slots.contains(&SlotKey::support_proof(12)));

        // Provider ids without the flag contribute nothing; the cross-field
        // validator rejects this combination separately.
        form.financial_declaration.receiving_other_support = false;
        let slots = required_attachment_slots(&form);
        assert!(!slots.contains(&SlotKey::support_proof(7)));
    }

    #[test]
    fn resolver_is_deterministic() {
        let mut form = bare_form();
        form.family_info.siblings.study_in_ipt.push(SiblingMember {
            member_id: "s1".into(),
            full_name: "Nur".into(),
            age: 19,
            monthly_salary: None,
        });
        assert_eq!(required_attachment_slots(&form), required_attachment_slots(&form));
    }

    #[test]
    fn grammar_accepts_every_constructor_output() {
        let keys = [
            SlotKey::student_id_proof(),
            SlotKey::latest_transcript(),
            SlotKey::outstanding_invoice(),
            SlotKey::father_payslip(),
            SlotKey::mother_payslip(),
            SlotKey::oku_card(),
            SlotKey::chronic_illness_doc(),
            SlotKey::sibling_ic_doc(SiblingBucket::Age6Below, "m1"),
            SlotKey::sibling_payslip("m1"),
            SlotKey::support_proof(42),
        ];
        for key in keys {
            assert_eq!(SlotKey::parse(key.as_str()), Ok(key));
        }
    }

    #[test]
    fn grammar_rejects_foreign_keys() {
        for bad in [
            "",
            "personal.passport",
            "siblings.unknownBucket.m1.icDoc",
            "siblings.above18NonWorking.m1.payslip", // payslip only for working bucket
            "siblings.above18Working..icDoc",        // empty member id
            "financial.support.abc.proof",           // provider ids are numeric
            "personal.studentIdProof/../../etc",
            "family.fatherGuardian.payslip.extra",
        ] {
            assert!(SlotKey::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
