mod patch;
mod validate;

pub mod schema;
pub mod slots;

pub use patch::{
    ApplicationFormPatch, FamilyInfoPatch, GuardianPatch, PersonalInfoPatch, SiblingsPatch,
    SpecialTreatmentPatch, merge_form,
};
pub use schema::{
    ApplicationFormV2, FORM_SCHEMA_VERSION, FamilyInfo, FinancialDeclaration, FormPayload,
    Guardian, Nationality, PersonalInfo, SiblingBucket, SiblingMember, Siblings, SpecialTreatment,
    is_application_form_v2,
};
pub use slots::{SlotKey, SlotKeyError, required_attachment_slots};
pub use validate::{ValidationError, normalize_phone, validate_form};
