pub mod prescription;

pub use prescription::{Medicine, PatientData, Prescription, PrescriptionDraft};
