use facegate_core::{AnalyzerError, FaceAnalyzer, FaceDescription, ModelWeights, OnnxAnalyzer};
use facegate_hw::{Camera, CameraError, Frame, FrameError, FrameSource};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("image error: {0}")]
    Image(#[from] FrameError),
    #[error("models are not loaded")]
    ModelsNotLoaded,
    #[error("camera is not open")]
    CameraClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Faces found in one captured frame.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub faces: Vec<FaceDescription>,
    pub width: u32,
    pub height: u32,
}

/// Where the engine gets its analyzer and frame source from.
pub trait Backend: Send + 'static {
    fn load_models(&mut self, weights: &ModelWeights) -> Result<Box<dyn FaceAnalyzer>, AnalyzerError>;
    fn open_camera(&mut self) -> Result<Box<dyn FrameSource>, CameraError>;
}

/// ONNX Runtime analyzer and a V4L2 camera.
pub struct HardwareBackend {
    pub camera_device: String,
    pub width: u32,
    pub height: u32,
}

impl Backend for HardwareBackend {
    fn load_models(&mut self, weights: &ModelWeights) -> Result<Box<dyn FaceAnalyzer>, AnalyzerError> {
        Ok(Box::new(OnnxAnalyzer::from_weights(weights)?))
    }

    fn open_camera(&mut self) -> Result<Box<dyn FrameSource>, CameraError> {
        let camera = Camera::open(&self.camera_device, self.width, self.height)?;
        tracing::info!(
            device = %self.camera_device,
            width = camera.width,
            height = camera.height,
            format = ?camera.format,
            "camera opened"
        );
        Ok(Box::new(camera))
    }
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    LoadModels {
        weights: ModelWeights,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Describe {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<Option<FaceDescription>, EngineError>>,
    },
    OpenCamera {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    CloseCamera {
        reply: oneshot::Sender<bool>,
    },
    Scan {
        reply: oneshot::Sender<Result<ScanOutput, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Build the inference sessions from in-memory weights, replacing any loaded ones.
    pub async fn load_models(&self, weights: ModelWeights) -> Result<(), EngineError> {
        self.call(|reply| EngineRequest::LoadModels { weights, reply }).await?
    }

    /// Decode an encoded still image and describe its most confident face.
    pub async fn describe(&self, image: Vec<u8>) -> Result<Option<FaceDescription>, EngineError> {
        self.call(|reply| EngineRequest::Describe { image, reply }).await?
    }

    pub async fn open_camera(&self) -> Result<(), EngineError> {
        self.call(|reply| EngineRequest::OpenCamera { reply }).await?
    }

    /// Release the camera. Returns whether one was open.
    pub async fn close_camera(&self) -> Result<bool, EngineError> {
        self.call(|reply| EngineRequest::CloseCamera { reply }).await
    }

    /// Capture one frame and describe every face in it.
    pub async fn scan(&self) -> Result<ScanOutput, EngineError> {
        self.call(|reply| EngineRequest::Scan { reply }).await?
    }
}

struct EngineState<B> {
    backend: B,
    analyzer: Option<Box<dyn FaceAnalyzer>>,
    camera: Option<Box<dyn FrameSource>>,
}

impl<B: Backend> EngineState<B> {
    fn load_models(&mut self, weights: &ModelWeights) -> Result<(), EngineError> {
        tracing::debug!(?weights, "loading models");
        self.analyzer = Some(self.backend.load_models(weights)?);
        tracing::info!("face models loaded");
        Ok(())
    }

    fn analyzer(&mut self) -> Result<&mut Box<dyn FaceAnalyzer>, EngineError> {
        self.analyzer.as_mut().ok_or(EngineError::ModelsNotLoaded)
    }

    fn describe(&mut self, image: &[u8]) -> Result<Option<FaceDescription>, EngineError> {
        let frame = Frame::decode(image)?;
        let analyzer = self.analyzer()?;
        Ok(analyzer.analyze_single(&frame.data, frame.width, frame.height)?)
    }

    fn open_camera(&mut self) -> Result<(), EngineError> {
        if self.camera.is_none() {
            self.camera = Some(self.backend.open_camera()?);
        }
        Ok(())
    }

    fn scan(&mut self) -> Result<ScanOutput, EngineError> {
        if self.analyzer.is_none() {
            return Err(EngineError::ModelsNotLoaded);
        }
        let frame = self.camera.as_mut().ok_or(EngineError::CameraClosed)?.capture()?;
        let faces = if frame.is_dark() {
            tracing::trace!(sequence = frame.sequence, "dark frame skipped");
            Vec::new()
        } else {
            self.analyzer()?.analyze(&frame.data, frame.width, frame.height)?
        };
        Ok(ScanOutput { faces, width: frame.width, height: frame.height })
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Nothing is loaded or opened up front; callers drive the lifecycle
/// through the returned handle. The thread exits once every handle is gone.
pub fn spawn_engine<B: Backend>(backend: B) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);
    let mut state = EngineState { backend, analyzer: None, camera: None };

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::LoadModels { weights, reply } => {
                        let _ = reply.send(state.load_models(&weights));
                    }
                    EngineRequest::Describe { image, reply } => {
                        let _ = reply.send(state.describe(&image));
                    }
                    EngineRequest::OpenCamera { reply } => {
                        let _ = reply.send(state.open_camera());
                    }
                    EngineRequest::CloseCamera { reply } => {
                        let _ = reply.send(state.camera.take().is_some());
                    }
                    EngineRequest::Scan { reply } => {
                        let _ = reply.send(state.scan());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn engine() -> (EngineHandle, Scene) {
        let scene = Scene::default();
        let handle = spawn_engine(ScriptedBackend { scene: scene.clone() }).unwrap();
        (handle, scene)
    }

    #[tokio::test]
    async fn test_requires_models_and_camera() {
        let (engine, _) = engine();
        assert!(matches!(engine.scan().await, Err(EngineError::ModelsNotLoaded)));
        assert!(matches!(engine.describe(png(5)).await, Err(EngineError::ModelsNotLoaded)));

        engine.load_models(weights()).await.unwrap();
        assert!(matches!(engine.scan().await, Err(EngineError::CameraClosed)));
    }

    #[tokio::test]
    async fn test_describe_decodes_image() {
        let (engine, scene) = engine();
        scene.face(7, &[0.1, 0.2]);
        engine.load_models(weights()).await.unwrap();

        let face = engine.describe(png(7)).await.unwrap().unwrap();
        assert_eq!(face.descriptor.values, vec![0.1, 0.2]);
        assert!(engine.describe(png(9)).await.unwrap().is_none());
        assert!(matches!(engine.describe(b"not an image".to_vec()).await, Err(EngineError::Image(_))));
    }

    #[tokio::test]
    async fn test_scan_and_camera_lifecycle() {
        let (engine, scene) = engine();
        scene.face(40, &[1.0]).face(40, &[2.0]);
        engine.load_models(weights()).await.unwrap();
        engine.open_camera().await.unwrap();
        engine.open_camera().await.unwrap();
        assert_eq!(scene.camera_opens.load(std::sync::atomic::Ordering::SeqCst), 1);

        scene.show(40);
        let out = engine.scan().await.unwrap();
        assert_eq!(out.faces.len(), 2);
        assert_eq!((out.width, out.height), (FRAME_SIDE, FRAME_SIDE));

        // Dark frames are not analyzed.
        scene.face(0, &[3.0]);
        scene.show(0);
        assert!(engine.scan().await.unwrap().faces.is_empty());

        assert!(engine.close_camera().await.unwrap());
        assert!(!scene.camera_is_open());
        assert!(!engine.close_camera().await.unwrap());
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let (engine, scene) = engine();
        scene.fail_models.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(engine.load_models(weights()).await, Err(EngineError::Analyzer(_))));
    }
}
