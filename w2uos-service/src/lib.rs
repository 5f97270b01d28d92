use anyhow::Result;

pub type ServiceId = String;

/// Lifecycle position of a long-running service.
///
/// `Stopped` is both the initial and the terminal state; a service passes
/// through `Stopping` while it winds down in-flight work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ServiceState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

impl ServiceState {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Running)
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ServiceState::Stopped => "stopped",
                ServiceState::Running => "running",
                ServiceState::Stopping => "stopping",
            }
        )
    }
}

#[async_trait::async_trait]
pub trait Service: Send + Sync {
    fn id(&self) -> &ServiceId;
    fn state(&self) -> ServiceState;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn health_check(&self) -> Result<()>;
}
