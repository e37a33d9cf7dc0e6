use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional alignment landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Face descriptor produced by the recognition network.
///
/// The length depends on the loaded model (128 for the face-api family,
/// 512 for ArcFace). Descriptors of different lengths never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance between two descriptors.
    ///
    /// Returns `f32::INFINITY` when the lengths differ.
    pub fn distance(&self, other: &Descriptor) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One or more descriptors derived from an account's profile photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledDescriptor {
    /// Account id the descriptors belong to.
    pub label: String,
    pub descriptors: Vec<Descriptor>,
}

impl LabeledDescriptor {
    pub fn new(label: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        Self {
            label: label.into(),
            descriptors,
        }
    }
}

/// Everything the analyzer extracts from one detected face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDescription {
    pub bbox: BoundingBox,
    /// Dense landmarks (106 points) in frame coordinates, used for the overlay.
    pub landmarks: Vec<(f32, f32)>,
    pub descriptor: Descriptor,
}

/// Raw bytes of the three networks, as fetched from the model cache.
#[derive(Clone)]
pub struct ModelWeights {
    pub detector: Vec<u8>,
    pub landmarks: Vec<u8>,
    pub recognizer: Vec<u8>,
}

impl std::fmt::Debug for ModelWeights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelWeights")
            .field("detector", &self.detector.len())
            .field("landmarks", &self.landmarks.len())
            .field("recognizer", &self.recognizer.len())
            .finish()
    }
}
