//! Status snapshot published to kiosk shells.

use crate::engine::ScanOutput;
use facegate_core::{Account, FaceMatcher, LoginResult};
use serde::Serialize;

/// Where the kiosk is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Warming caches, loading models, describing account photos.
    LoadingModels,
    /// Models loaded; waiting for a scan request.
    Ready,
    /// Camera open, match loop running.
    Scanning,
    /// Session confirmed and persisted.
    Authenticated,
    /// Boot failed; needs a reload.
    Error,
}

/// One face of the last scanned frame, in display coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayFace {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label: String,
    pub distance: f32,
    pub landmarks: Vec<(f32, f32)>,
}

/// Scale the faces of `scan` from camera to display resolution and label them.
pub fn overlay(scan: &ScanOutput, matcher: &FaceMatcher, display: (u32, u32)) -> Vec<OverlayFace> {
    if scan.width == 0 || scan.height == 0 {
        return Vec::new();
    }
    let sx = display.0 as f32 / scan.width as f32;
    let sy = display.1 as f32 / scan.height as f32;
    scan.faces
        .iter()
        .map(|face| {
            let (label, distance) = matcher
                .best_match(&face.descriptor)
                .map(|m| (m.label, m.distance))
                .unwrap_or_else(|| (facegate_core::matcher::UNKNOWN_LABEL.to_string(), f32::INFINITY));
            OverlayFace {
                x: face.bbox.x * sx,
                y: face.bbox.y * sy,
                width: face.bbox.width * sx,
                height: face.bbox.height * sy,
                label,
                distance,
                landmarks: face.landmarks.iter().map(|&(x, y)| (x * sx, y * sy)).collect(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub camera_active: bool,
    pub result: LoginResult,
    pub scanned: bool,
    pub counter: u32,
    pub candidate: Option<Account>,
    /// Account of the persisted session, when it is valid.
    pub session: Option<Account>,
    pub route: String,
    pub overlay: Vec<OverlayFace>,
    pub offline_ready: bool,
    pub need_refresh: bool,
}

impl Snapshot {
    /// Prompt lines a shell shows for this state.
    pub fn headline(&self) -> Vec<String> {
        if self.phase == Phase::Error {
            return vec![
                "Oops! There is no profile picture associated with this account.".into(),
                "Please contact administration for registration or try again later.".into(),
            ];
        }
        if !self.camera_active {
            return match self.phase {
                Phase::LoadingModels => vec![
                    "You're Attempting to Log In With Your Face.".into(),
                    "Loading Models...".into(),
                ],
                Phase::Ready => vec!["Please Recognize Your Face to Completely Log In".into()],
                _ => Vec::new(),
            };
        }
        match (self.result, &self.candidate) {
            (LoginResult::Success, Some(account)) => vec![
                "We've successfully recognized your face!".into(),
                format!("Logging in as {}...", account.full_name),
                format!("Please stay {} more seconds...", self.counter),
            ],
            (LoginResult::Failed, _) => vec!["Oops! We did not recognize your face.".into()],
            (LoginResult::Pending, _) if !self.scanned => vec!["Scanning Face...".into()],
            _ => Vec::new(),
        }
    }

    /// Update toast, if one should be shown.
    pub fn toast(&self) -> Option<&'static str> {
        if self.need_refresh {
            Some("New content available, click on reload button to update.")
        } else if self.offline_ready {
            Some("App ready to work offline")
        } else {
            None
        }
    }

    /// JSON with the prompt lines and toast included.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Report<'a> {
            #[serde(flatten)]
            snapshot: &'a Snapshot,
            headline: Vec<String>,
            toast: Option<&'static str>,
        }
        serde_json::to_string(&Report { snapshot: self, headline: self.headline(), toast: self.toast() })
    }
}
