pub mod bands;
pub mod capture;
pub mod ring;
pub mod smoothing;
pub mod spectrum;
pub mod status;
