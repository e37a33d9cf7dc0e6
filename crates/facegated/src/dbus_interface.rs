use crate::kiosk::{Kiosk, KioskError};
use zbus::interface;

pub const BUS_NAME: &str = "org.facegate.Kiosk1";
pub const OBJECT_PATH: &str = "/org/facegate/Kiosk1";

/// D-Bus interface for the kiosk daemon.
///
/// Bus name: org.facegate.Kiosk1
/// Object path: /org/facegate/Kiosk1
pub struct KioskService {
    pub kiosk: Kiosk,
}

fn to_fdo(e: KioskError) -> zbus::fdo::Error {
    match e {
        KioskError::NotReady(_) => zbus::fdo::Error::NotSupported(e.to_string()),
        KioskError::Engine(_) | KioskError::Store(_) => zbus::fdo::Error::Failed(e.to_string()),
    }
}

#[interface(name = "org.facegate.Kiosk1")]
impl KioskService {
    /// Status snapshot as JSON, including prompt lines and overlay.
    async fn status(&self) -> zbus::fdo::Result<String> {
        self.kiosk
            .snapshot()
            .to_json()
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Open the camera and start matching.
    async fn scan_face(&self) -> zbus::fdo::Result<()> {
        tracing::info!("scan requested");
        self.kiosk.scan_face().await.map_err(to_fdo)
    }

    /// Ask to show `path`; returns the route actually shown.
    async fn navigate(&self, path: &str) -> zbus::fdo::Result<String> {
        if !path.starts_with('/') {
            return Err(zbus::fdo::Error::InvalidArgs(format!("route must be absolute: {path:?}")));
        }
        Ok(self.kiosk.navigate(path))
    }

    async fn logout(&self) -> zbus::fdo::Result<()> {
        tracing::info!("logout requested");
        self.kiosk.logout().await.map_err(to_fdo)
    }

    /// Adopt the new deployment. Returns immediately; progress shows in `Status`.
    async fn reload(&self) -> zbus::fdo::Result<()> {
        tracing::info!("reload requested");
        let kiosk = self.kiosk.clone();
        tokio::spawn(async move {
            if let Err(e) = kiosk.reload().await {
                tracing::error!(error = %e, "reload failed");
            }
        });
        Ok(())
    }

    /// Close the update toast.
    async fn dismiss(&self) -> zbus::fdo::Result<()> {
        self.kiosk.dismiss();
        Ok(())
    }

    /// Registered accounts as JSON.
    async fn accounts(&self) -> zbus::fdo::Result<String> {
        let accounts: Vec<_> = self.kiosk.registry().iter().collect();
        serde_json::to_string(&accounts).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}
