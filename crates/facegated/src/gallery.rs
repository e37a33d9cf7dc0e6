//! Reference descriptors built from the account photos.

use crate::assets::Assets;
use crate::engine::EngineHandle;
use facegate_core::{LabeledDescriptor, Registry};

/// Describe every account photo, in registry order.
///
/// Accounts whose photo cannot be fetched, decoded or holds no face are
/// logged and left out.
pub async fn build_gallery(assets: &Assets, engine: &EngineHandle, registry: &Registry) -> Vec<LabeledDescriptor> {
    let mut gallery = Vec::with_capacity(registry.len());
    for account in registry.iter() {
        let image = match assets.profile_image(account).await {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(account = %account.id, error = %e, "profile picture unavailable");
                continue;
            }
        };
        match engine.describe(image).await {
            Ok(Some(face)) => {
                tracing::debug!(
                    account = %account.id,
                    confidence = face.bbox.confidence,
                    dimension = face.descriptor.len(),
                    "reference descriptor computed"
                );
                gallery.push(LabeledDescriptor::new(account.id.clone(), vec![face.descriptor]));
            }
            Ok(None) => tracing::error!(account = %account.id, "no face found in profile picture"),
            Err(e) => tracing::error!(account = %account.id, error = %e, "failed to describe profile picture"),
        }
    }
    tracing::info!(accounts = registry.len(), described = gallery.len(), "reference descriptors ready");
    gallery
}
