//! facegate-core: face analysis and login logic for the kiosk.
//!
//! Runs SCRFD detection, 2d106 landmarks and ArcFace-style descriptors via
//! ONNX Runtime, and holds the pure state machines the daemon drives:
//! descriptor matching, login classification, the confirmation countdown
//! and the route guard.

pub mod alignment;
pub mod analyzer;
pub mod countdown;
pub mod detector;
pub mod guard;
pub mod landmarks;
pub mod login;
pub mod matcher;
pub mod recognizer;
pub mod registry;
pub mod session;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use countdown::{CountdownCommand, SessionConfirmer, Tick};
pub use guard::{Navigation, RouteGuard};
pub use login::{LoginResult, LoginTracker};
pub use matcher::{FaceMatch, FaceMatcher};
pub use registry::{Account, Registry};
pub use session::Session;
pub use types::{BoundingBox, Descriptor, FaceDescription, LabeledDescriptor, ModelWeights};
