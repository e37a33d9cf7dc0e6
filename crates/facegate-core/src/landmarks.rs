//! Dense 106-point landmark network (insightface `2d106det`) via ONNX Runtime.

use crate::alignment::{self, Similarity};
use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

const LANDMARK_INPUT_SIZE: usize = 192;
/// Crop side relative to the larger box side.
const LANDMARK_CROP_RATIO: f32 = 1.5;
const LANDMARK_POINTS: usize = 106;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("landmark weights are empty")]
    EmptyWeights,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct LandmarkNet {
    session: Session,
}

impl LandmarkNet {
    pub fn from_bytes(weights: &[u8]) -> Result<Self, LandmarkError> {
        if weights.is_empty() {
            return Err(LandmarkError::EmptyWeights);
        }
        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_memory(weights)?;
        tracing::info!(bytes = weights.len(), "loaded 2d106 landmark model");
        Ok(Self { session })
    }

    /// Predict dense landmarks for one detection, in frame coordinates.
    pub fn predict(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Vec<(f32, f32)>, LandmarkError> {
        let crop_transform = crop_for(face);
        let crop = alignment::warp(frame, width as usize, height as usize, &crop_transform, LANDMARK_INPUT_SIZE);
        let input = to_input_tensor(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("landmark output: {e}")))?;

        if raw.len() < LANDMARK_POINTS * 2 {
            return Err(LandmarkError::InferenceFailed(format!(
                "expected {} values, got {}",
                LANDMARK_POINTS * 2,
                raw.len()
            )));
        }

        let inverse = crop_transform
            .invert()
            .ok_or_else(|| LandmarkError::InferenceFailed("degenerate crop".into()))?;
        Ok(decode(raw, &inverse))
    }
}

/// Square crop around the box centre, scaled so the box fills 1/1.5 of it.
fn crop_for(face: &BoundingBox) -> Similarity {
    let side = face.width.max(face.height) * LANDMARK_CROP_RATIO;
    let scale = if side > 0.0 { LANDMARK_INPUT_SIZE as f32 / side } else { 1.0 };
    Similarity::scale_about(face.center(), scale, LANDMARK_INPUT_SIZE as f32 / 2.0)
}

/// Raw pixels, no normalization, grayscale replicated to three channels.
fn to_input_tensor(crop: &[u8]) -> Array4<f32> {
    let size = LANDMARK_INPUT_SIZE;
    Array4::from_shape_fn((1, 3, size, size), |(_, _, y, x)| crop[y * size + x] as f32)
}

/// Outputs are in [-1, 1] over the crop; map back through the inverse crop.
fn decode(raw: &[f32], inverse: &Similarity) -> Vec<(f32, f32)> {
    let half = LANDMARK_INPUT_SIZE as f32 / 2.0;
    raw.chunks_exact(2)
        .take(LANDMARK_POINTS)
        .map(|p| inverse.apply(((p[0] + 1.0) * half, (p[1] + 1.0) * half)))
        .collect()
}
