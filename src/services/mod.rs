pub mod dispatch_service;
pub mod plan_service;
pub mod progress_service;
pub mod recovery_service;
pub mod scoring_service;
