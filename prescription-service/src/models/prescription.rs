use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize, Serializer};

/// Patient section of a prescription. Every field is optional in storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

/// One prescribed medicine. `id` is supplied by the caller and not checked
/// for uniqueness. Integer and double ids both read back as `f64`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number"
    )]
    pub id: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
}

/// Largest magnitude below which every integer is exact in an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Writes whole numbers as integers so `1` renders as `1`, not `1.0`.
fn serialize_number<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match *value {
        Some(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
            serializer.serialize_some(&(n as i64))
        }
        Some(n) => serializer.serialize_some(&n),
        None => serializer.serialize_none(),
    }
}

/// A prescription as stored in the `prescriptions` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub patient_data: PatientData,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// The caller-controlled part of a prescription, accepted by create and
/// full-replace update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrescriptionDraft {
    pub patient_data: PatientData,
    pub medicines: Vec<Medicine>,
    pub note: String,
}

impl Prescription {
    /// Builds a new document with a fresh id and both timestamps set to `now`.
    pub fn new(draft: PrescriptionDraft, now: DateTime) -> Self {
        Self {
            id: ObjectId::new(),
            patient_data: draft.patient_data,
            medicines: draft.medicines,
            note: draft.note,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the caller-controlled fields in place. `id` and
    /// `created_at` are never touched.
    pub fn apply(&mut self, draft: PrescriptionDraft, now: DateTime) {
        self.patient_data = draft.patient_data;
        self.medicines = draft.medicines;
        self.note = draft.note;
        self.updated_at = now;
    }
}
