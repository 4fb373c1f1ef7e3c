pub mod intake;

pub use intake::VisitIntake;
