//! ArcFace-style recognition network via ONNX Runtime.
//!
//! Produces an L2-normalized descriptor from a 112x112 aligned crop.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::types::{BoundingBox, Descriptor};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

const RECOGNIZER_MEAN: f32 = 127.5;
const RECOGNIZER_STD: f32 = 127.5;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("recognizer weights are empty")]
    EmptyWeights,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks; alignment needs the detector's five points")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct FaceRecognizer {
    session: Session,
    /// Descriptor length seen on the first inference; all later ones must agree.
    dimension: Option<usize>,
}

impl FaceRecognizer {
    pub fn from_bytes(weights: &[u8]) -> Result<Self, RecognizerError> {
        if weights.is_empty() {
            return Err(RecognizerError::EmptyWeights);
        }
        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_memory(weights)?;

        tracing::info!(
            inputs = ?session.inputs().iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
            bytes = weights.len(),
            "loaded recognition model"
        );
        Ok(Self { session, dimension: None })
    }

    /// Compute the descriptor of one detected face in a grayscale frame.
    pub fn describe(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Descriptor, RecognizerError> {
        let landmarks = face.landmarks.as_ref().ok_or(RecognizerError::NoLandmarks)?;
        let aligned = alignment::align_face(frame, width, height, landmarks);
        let input = to_input_tensor(&aligned);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("descriptor output: {e}")))?;

        match self.dimension {
            Some(dim) if dim != raw.len() => {
                return Err(RecognizerError::InferenceFailed(format!(
                    "descriptor length changed from {dim} to {}",
                    raw.len()
                )));
            }
            None => self.dimension = Some(raw.len()),
            _ => {}
        }

        Ok(Descriptor::new(l2_normalize(raw)))
    }
}

fn to_input_tensor(aligned: &[u8]) -> Array4<f32> {
    Array4::from_shape_fn((1, 3, ALIGNED_SIZE, ALIGNED_SIZE), |(_, _, y, x)| {
        let pixel = aligned.get(y * ALIGNED_SIZE + x).copied().unwrap_or(0) as f32;
        (pixel - RECOGNIZER_MEAN) / RECOGNIZER_STD
    })
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|v| v / norm).collect()
    } else {
        raw.to_vec()
    }
}
