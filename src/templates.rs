use crate::config::Config;
use crate::error::TemplateError;
use crate::frame::Frame;
use std::path::Path;

/// The three reference images the loop matches against
#[derive(Debug, Clone)]
pub struct TemplateSet {
    /// Game window
    pub anchor: Frame,
    /// "Play" button
    pub start: Frame,
    /// "Play again" button shown when a round ends
    pub round_end: Frame,
}

impl TemplateSet {
    /// Load the templates named in `config` from its template directory
    pub fn load(config: &Config) -> Result<Self, TemplateError> {
        let dir = config.template_dir_path();
        tracing::info!("Loading templates from {}", dir.display());

        Ok(Self {
            anchor: load_one("anchor", &dir.join(&config.anchor_template))?,
            start: load_one("start", &dir.join(&config.start_template))?,
            round_end: load_one("round-end", &dir.join(&config.round_end_template))?,
        })
    }
}

fn load_one(name: &'static str, path: &Path) -> Result<Frame, TemplateError> {
    let image = image::open(path).map_err(|source| TemplateError::LoadFailed {
        name,
        path: path.display().to_string(),
        source,
    })?;
    let frame = image.to_rgb8();
    tracing::debug!(
        "Loaded {} template {}x{} from {}",
        name,
        frame.width(),
        frame.height(),
        path.display()
    );
    Ok(frame)
}
