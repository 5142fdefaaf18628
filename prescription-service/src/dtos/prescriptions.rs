//! Wire shapes for the prescription endpoints.
//!
//! Request bodies are read loosely: required sections are checked for
//! presence with JavaScript-style truthiness and scalar fields are coerced
//! the way the document mapper in front of the original collection did
//! (numbers become text, date strings become timestamps, ...).

use crate::error::{Operation, PrescriptionError};
use crate::models::{Medicine, PatientData, Prescription, PrescriptionDraft};
use crate::services::StoreError;
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use mongodb::bson::DateTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `POST /api/prescriptions` and `PUT /api/prescriptions/:id`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionPayload {
    #[serde(default)]
    pub patient_data: Option<Value>,
    #[serde(default)]
    pub medicines: Option<Value>,
    #[serde(default)]
    pub note: Option<Value>,
}

impl PrescriptionPayload {
    /// Parses a raw request body. An empty body reads as `{}` and a JSON
    /// array carries no fields; anything else that is not an object is
    /// rejected.
    pub fn from_body(body: &[u8]) -> Result<Self, PrescriptionError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| PrescriptionError::MalformedBody(e.to_string()))?;

        match value {
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| PrescriptionError::MalformedBody(e.to_string())),
            Value::Array(_) => Ok(Self::default()),
            _ => Err(PrescriptionError::MalformedBody(
                "expected a JSON object".to_string(),
            )),
        }
    }

    /// Checks that `patientData` and `medicines` are present and converts
    /// the payload into storable form. Values that cannot be cast to the
    /// stored field types fail `operation` like any other persistence error.
    pub fn into_draft(
        self,
        operation: Operation,
    ) -> Result<PrescriptionDraft, PrescriptionError> {
        let (patient_data, medicines) = match (
            self.patient_data.filter(is_truthy),
            self.medicines.filter(is_truthy),
        ) {
            (Some(patient_data), Some(medicines)) => (patient_data, medicines),
            _ => return Err(PrescriptionError::MissingRequiredFields),
        };

        let cast =
            |reason: String| PrescriptionError::from_store(operation, StoreError::Cast(reason));

        Ok(PrescriptionDraft {
            patient_data: patient_data_from(patient_data).map_err(cast)?,
            medicines: medicines_from(medicines).map_err(cast)?,
            note: note_from(self.note).map_err(cast)?,
        })
    }
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn patient_data_from(value: Value) -> Result<PatientData, String> {
    if !value.is_object() {
        return Err("patientData must be an object".to_string());
    }

    let input: PatientDataInput =
        serde_json::from_value(value).map_err(|e| format!("patientData: {}", e))?;

    Ok(PatientData {
        name: input.name,
        age: input.age,
        gender: input.gender,
        diagnosis: input.diagnosis,
        date: input.date,
        place: input.place,
    })
}

fn medicines_from(value: Value) -> Result<Vec<Medicine>, String> {
    let items = match value {
        Value::Array(items) => items,
        // A lone medicine object is taken as a one-element list
        object @ Value::Object(_) => vec![object],
        _ => return Err("medicines must be an array".to_string()),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(format!("medicines[{}] must be an object", index));
            }
            let input: MedicineInput = serde_json::from_value(item)
                .map_err(|e| format!("medicines[{}]: {}", index, e))?;
            Ok(Medicine {
                id: input.id,
                name: input.name,
                dose: input.dose,
            })
        })
        .collect()
}

/// `note || ''`
fn note_from(note: Option<Value>) -> Result<String, String> {
    match note.filter(is_truthy) {
        None => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(flag)) => Ok(flag.to_string()),
        Some(_) => Err("note must be text".to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatientDataInput {
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    age: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    gender: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    diagnosis: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    date: Option<DateTime>,
    #[serde(deserialize_with = "lenient_text")]
    place: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MedicineInput {
    #[serde(deserialize_with = "lenient_number")]
    id: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    dose: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Flag(flag) => flag.to_string(),
    }))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Integer(i)) => Ok(Some(i as f64)),
        Some(Scalar::Float(f)) => Ok(Some(f)),
        Some(Scalar::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Scalar::Text(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a number, got {:?}", text))),
        Some(Scalar::Flag(flag)) => Ok(Some(if flag { 1.0 } else { 0.0 })),
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Scalar::Text(text)) => parse_date(&text)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date {:?}", text))),
        Some(Scalar::Integer(millis)) => Ok(Some(DateTime::from_millis(millis))),
        Some(Scalar::Float(millis)) => integral(millis.trunc())
            .map(|ms| Some(DateTime::from_millis(ms)))
            .ok_or_else(|| D::Error::custom("invalid date")),
        Some(Scalar::Flag(_)) => Err(D::Error::custom("invalid date")),
    }
}

/// RFC 3339, zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC) or a
/// plain `YYYY-MM-DD` (midnight UTC).
fn parse_date(text: &str) -> Option<DateTime> {
    let text = text.trim();

    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(DateTime::from_chrono(parsed.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(DateTime::from_chrono(naive.and_utc()));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_chrono(naive.and_utc()))
}

/// Prescription as returned by every endpoint. `_id` and `id` carry the
/// same value so clients of either convention can read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionResponse {
    #[serde(rename = "_id")]
    pub object_id: String,
    pub id: String,
    pub patient_data: PatientDataResponse,
    pub medicines: Vec<Medicine>,
    pub note: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientDataResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

fn to_rfc3339(value: DateTime) -> String {
    value
        .to_chrono()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<PatientData> for PatientDataResponse {
    fn from(data: PatientData) -> Self {
        Self {
            name: data.name,
            age: data.age,
            gender: data.gender,
            diagnosis: data.diagnosis,
            date: data.date.map(to_rfc3339),
            place: data.place,
        }
    }
}

impl From<Prescription> for PrescriptionResponse {
    fn from(prescription: Prescription) -> Self {
        let id = prescription.id.to_hex();
        Self {
            object_id: id.clone(),
            id,
            patient_data: prescription.patient_data.into(),
            medicines: prescription.medicines,
            note: prescription.note,
            created_at: to_rfc3339(prescription.created_at),
            updated_at: to_rfc3339(prescription.updated_at),
        }
    }
}
