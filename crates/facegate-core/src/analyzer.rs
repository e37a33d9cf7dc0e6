//! Detection + landmarks + descriptor pipeline.

use crate::detector::{DetectorError, FaceDetector};
use crate::landmarks::{LandmarkError, LandmarkNet};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{FaceDescription, ModelWeights};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("landmarks: {0}")]
    Landmarks(#[from] LandmarkError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Turns a grayscale frame into described faces.
pub trait FaceAnalyzer: Send {
    /// Describe every face in the frame, highest detection confidence first.
    fn analyze(&mut self, frame: &[u8], width: u32, height: u32) -> Result<Vec<FaceDescription>, AnalyzerError>;

    /// Describe only the most confident face, if any.
    fn analyze_single(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<FaceDescription>, AnalyzerError> {
        Ok(self.analyze(frame, width, height)?.into_iter().next())
    }
}

/// ONNX Runtime implementation holding the three networks.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    landmarks: LandmarkNet,
    recognizer: FaceRecognizer,
}

impl OnnxAnalyzer {
    pub fn from_weights(weights: &ModelWeights) -> Result<Self, AnalyzerError> {
        Ok(Self {
            detector: FaceDetector::from_bytes(&weights.detector)?,
            landmarks: LandmarkNet::from_bytes(&weights.landmarks)?,
            recognizer: FaceRecognizer::from_bytes(&weights.recognizer)?,
        })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn analyze(&mut self, frame: &[u8], width: u32, height: u32) -> Result<Vec<FaceDescription>, AnalyzerError> {
        let boxes = self.detector.detect(frame, width, height)?;
        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let landmarks = self.landmarks.predict(frame, width, height, &bbox)?;
            let descriptor = self.recognizer.describe(frame, width, height, &bbox)?;
            faces.push(FaceDescription { bbox, landmarks, descriptor });
        }
        Ok(faces)
    }

    fn analyze_single(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<FaceDescription>, AnalyzerError> {
        // Skip landmark/descriptor work for every face but the best one.
        let Some(bbox) = self.detector.detect(frame, width, height)?.into_iter().next() else {
            return Ok(None);
        };
        let landmarks = self.landmarks.predict(frame, width, height, &bbox)?;
        let descriptor = self.recognizer.describe(frame, width, height, &bbox)?;
        Ok(Some(FaceDescription { bbox, landmarks, descriptor }))
    }
}
