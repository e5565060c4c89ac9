//! Analog instrument responses

pub mod model;
pub mod paz;

pub use model::SeismometerModel;
pub use paz::InstrumentResponse;
