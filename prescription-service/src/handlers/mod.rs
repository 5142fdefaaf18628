pub mod health;
pub mod prescriptions;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use prescriptions::{
    create_prescription, delete_prescription, get_prescription, list_prescriptions,
    update_prescription,
};
