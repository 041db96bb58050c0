//! Connectivity indicators for the local server and the mesh.

use super::routing::MeshHealthProbe;
use super::transport::HttpTransport;
use log::{debug, info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Mesh,
}

/// One indicator model shared by both backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityStatus {
    pub backend: BackendKind,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_count: Option<u64>,
}

impl ConnectivityStatus {
    pub fn local(healthy: bool) -> Self {
        Self {
            backend: BackendKind::Local,
            healthy,
            peer_count: None,
        }
    }

    pub fn mesh(peer_count: Option<u64>) -> Self {
        Self {
            backend: BackendKind::Mesh,
            healthy: peer_count.is_some_and(|peers| peers > 0),
            peer_count,
        }
    }

    /// Short human-readable label.
    pub fn summary(&self) -> String {
        match (self.backend, self.healthy, self.peer_count) {
            (BackendKind::Mesh, true, Some(1)) => "1 peer".to_string(),
            (BackendKind::Mesh, true, Some(peers)) => format!("{} peers", peers),
            (BackendKind::Mesh, _, _) => "Local only".to_string(),
            (BackendKind::Local, true, _) => "Local server online".to_string(),
            (BackendKind::Local, false, _) => "Local server offline".to_string(),
        }
    }
}

pub async fn check_local_health(transport: &HttpTransport) -> ConnectivityStatus {
    match transport.local_health().await {
        Ok(()) => {
            info!("Local inference server healthy");
            ConnectivityStatus::local(true)
        }
        Err(e) => {
            warn!("Local inference server health check failed: {}", e);
            ConnectivityStatus::local(false)
        }
    }
}

/// Mesh indicator; a stopped mesh or a failed probe reads as "Local only".
pub async fn mesh_connectivity(probe: &dyn MeshHealthProbe) -> ConnectivityStatus {
    match probe.mesh_status().await {
        Ok(status) if status.is_running() => ConnectivityStatus::mesh(Some(status.peer_count())),
        Ok(_) => {
            debug!("Mesh reported not running");
            ConnectivityStatus::mesh(None)
        }
        Err(e) => {
            debug!("Mesh status unavailable: {}", e);
            ConnectivityStatus::mesh(None)
        }
    }
}
