use auto_launch::{AutoLaunch, AutoLaunchBuilder};
use tracing::info;

use super::controller::LaunchDirectives;

/// OS login entry for the executable.
///
/// The entry always passes `auto-start`, so whether a login launch actually
/// runs is decided by the persisted autostart flag, not by the entry.
pub struct LoginItem {
    app_name: String,
    app_path: String,
}

impl LoginItem {
    pub fn new(app_name: impl Into<String>, app_path: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_path: app_path.into(),
        }
    }

    pub fn args(&self) -> [&'static str; 1] {
        [LaunchDirectives::AUTO_START]
    }

    fn launcher(&self) -> auto_launch::Result<AutoLaunch> {
        AutoLaunchBuilder::new()
            .set_app_name(&self.app_name)
            .set_app_path(&self.app_path)
            .set_args(&self.args())
            .build()
    }

    /// Registers the entry if it is missing. Returns `true` when it was added.
    pub fn ensure_registered(&self) -> auto_launch::Result<bool> {
        let launcher = self.launcher()?;
        if launcher.is_enabled()? {
            return Ok(false);
        }
        launcher.enable()?;
        info!(app = %self.app_name, path = %self.app_path, "registered login item");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_launch_is_autostart_aware() {
        let item = LoginItem::new("VisualBreak", "/opt/visual-break/visual-break");
        let directives = LaunchDirectives::from_args(item.args());
        assert!(directives.autostart_aware);
        assert!(!directives.force_start);
    }
}
