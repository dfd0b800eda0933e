//! CLI route: single route table and run context. Drives an edit session and formats results.

use crate::cli::parse::{Commands, EditStep};
use crate::codec::{self, FileDecoder};
use crate::config::{ConfigLoader, EraserConfig};
use crate::error::EditError;
use crate::provider::HttpBackgroundRemover;
use crate::session::EditSession;
use crate::transform::{Settled, TransformOp};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Runtime context for CLI execution: resolved configuration and workspace.
pub struct RunContext {
    workspace_root: PathBuf,
    config: EraserConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, EditError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.ensure_valid()?;
        Ok(Self::with_config(workspace_root, config))
    }

    pub fn with_config(workspace_root: PathBuf, config: EraserConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &EraserConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a command and return its printable output.
    pub fn execute(&self, command: &Commands) -> Result<String, EditError> {
        match command {
            Commands::Apply {
                input,
                output,
                steps,
                endpoint,
            } => self.handle_apply(input, output, steps, endpoint.as_deref()),
            Commands::Config { format } => self.handle_config(format),
        }
    }

    fn handle_apply(
        &self,
        input: &Path,
        output: &Path,
        steps: &[EditStep],
        endpoint: Option<&str>,
    ) -> Result<String, EditError> {
        let mut provider_config = self.config.provider.clone();
        if let Some(endpoint) = endpoint {
            provider_config.endpoint = Some(endpoint.to_string());
        }
        let provider = HttpBackgroundRemover::new(&provider_config)
            .map_err(|e| EditError::ConfigError(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let mut session = EditSession::from_config(
            &self.config.session,
            Arc::new(FileDecoder),
            Arc::new(provider),
        );

        runtime.block_on(async {
            let mut progress = session.progress();
            tokio::spawn(async move {
                while let Some(update) = progress.recv().await {
                    debug!(
                        request_id = %update.request_id,
                        step = update.step,
                        "Transform refinement received"
                    );
                }
            });

            session.select(input)?;
            run_steps(&mut session, steps).await
        })?;

        let result = session.current()?;
        codec::save_png(result, output)?;
        info!(output = %output.display(), "Result written");

        Ok(format!(
            "Wrote {} ({}x{}, {} state(s), {} redoable)",
            output.display(),
            result.width(),
            result.height(),
            session.history().depth(),
            session.history().redo_depth()
        ))
    }

    fn handle_config(&self, format: &str) -> Result<String, EditError> {
        let mut shown = self.config.clone();
        shown.provider = shown.provider.redacted();
        match format {
            "toml" => toml::to_string_pretty(&shown)
                .map_err(|e| EditError::ConfigError(format!("Failed to render config: {}", e))),
            "json" => serde_json::to_string_pretty(&shown)
                .map_err(|e| EditError::ConfigError(format!("Failed to render config: {}", e))),
            other => Err(EditError::ConfigError(format!(
                "Invalid format: {} (must be 'toml' or 'json')",
                other
            ))),
        }
    }
}

/// Run `steps` in order against an open session.
pub(crate) async fn run_steps(
    session: &mut EditSession,
    steps: &[EditStep],
) -> Result<(), EditError> {
    for step in steps {
        match step {
            EditStep::RemoveBackground => {
                let settled = session
                    .apply_transform_and_wait(TransformOp::AutoRemoveBackground)
                    .await?;
                if let Settled::Discarded { reason, .. } = settled {
                    debug!(?reason, "Background removal result discarded");
                }
            }
            EditStep::Undo => {
                session.undo()?;
            }
            EditStep::Redo => {
                session.redo()?;
            }
            EditStep::Reset => {
                session.reset()?;
            }
        }
        debug!(
            ?step,
            depth = session.history().depth(),
            redo_depth = session.history().redo_depth(),
            "Step applied"
        );
    }
    Ok(())
}
