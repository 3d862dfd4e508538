pub mod candidates;
pub mod error;
pub mod gate;
pub mod labels;
pub mod portion;
pub mod services;
pub mod session;
pub mod workflow;

pub use candidates::{Candidate, CandidateSet};
pub use error::SessionError;
pub use gate::{ConfidenceGate, GateDecision, Prediction};
pub use portion::{LookupKey, Portion};
pub use services::{Classifier, ImageData, NutritionService, PersistenceGateway, PreviewGuard, SelectedImage, UserId};
pub use session::{RecognitionResult, RecognitionSession, SessionState};
pub use workflow::ScanWorkflow;
