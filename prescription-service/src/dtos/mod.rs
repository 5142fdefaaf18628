pub mod prescriptions;

pub use prescriptions::{PatientDataResponse, PrescriptionPayload, PrescriptionResponse};
