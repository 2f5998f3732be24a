pub mod confidence;
pub mod failure;
pub mod operation;
pub mod progress;
pub mod recovery;
pub mod risk;
