use serde::Deserialize;

/// Page viewport in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A browser/device profile that cases are executed against.
///
/// Each configured profile gets its own worker and its own isolated sessions;
/// profiles never share browser state.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineProfile {
    pub name: String,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_headless() -> bool {
    true
}

impl EngineProfile {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            viewport: Viewport::default(),
            user_agent: None,
            headless: true,
        }
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport { width, height };
        self
    }
}
