use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::pipeline::Pipeline;

pub mod error;
pub mod services;

pub use services::Services;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Holds the resolved settings and one `Pipeline` whose graph is built once
/// and reused by every evaluation request.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Loads and validates configuration
    /// 2. Prepares the report output directory
    /// 3. Wires external capabilities (model, search, retrieval, renderer)
    /// 4. Builds the evaluation graph
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let output_dir = paths.resolve(&settings.report.output_dir);
        std::fs::create_dir_all(&output_dir).map_err(InitializationError::Io)?;

        let services = Arc::new(Services::from_settings(&settings, &paths).await);
        let pipeline = Arc::new(
            Pipeline::new(services, settings.pipeline.clone())
                .map_err(|e| InitializationError::Graph(e.into()))?,
        );

        tracing::info!(
            model = %settings.llm.model,
            output_dir = %output_dir.display(),
            "Application state initialized"
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            pipeline,
        }))
    }
}
