//! Driver dispatch: pick the backend for a mode and extension and run it.

use tracing::{debug, error};

use crate::backend::{presentation, word, BackendContext};
use crate::config::DriversConfig;
use crate::errors::DriverError;
use crate::models::{HostApp, Mode, Outcome, RoleMap, TargetExtension};

/// Run the backend responsible for `extension` in `mode`.
///
/// No backend is contacted when the extension is unsupported.
pub fn run(
    mode: Mode,
    extension: &TargetExtension,
    roles: &mut RoleMap,
    ctx: &BackendContext<'_>,
    drivers: &DriversConfig,
) -> Result<Outcome, DriverError> {
    let unsupported = || {
        let err = DriverError::UnsupportedExtension {
            mode,
            extension: extension.to_string(),
        };
        error!("{err}");
        err
    };

    let app = drivers
        .backend_for(extension.as_str())
        .ok_or_else(unsupported)?;
    debug!(%mode, %app, "dispatching");

    match (mode, app) {
        (Mode::Diff, HostApp::Word) => word::diff(ctx, roles),
        (Mode::Merge, HostApp::Word) => word::merge(ctx, roles),
        (Mode::Diff, HostApp::PowerPoint) => presentation::diff(ctx, roles),
        // Presentations can only be compared.
        (Mode::Merge, HostApp::PowerPoint) => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AutomationSession, ErrorCodes, SessionFactory};
    use crate::errors::AutomationError;
    use crate::prompt::FixedAnswer;

    struct NoApplications;

    impl SessionFactory for NoApplications {
        fn launch(&self, app: HostApp) -> Result<Box<dyn AutomationSession>, AutomationError> {
            Err(AutomationError::LaunchFailed {
                app,
                detail: "not installed".into(),
            })
        }
    }

    fn dispatch(mode: Mode, ext: &str) -> Result<Outcome, DriverError> {
        let codes = ErrorCodes::default();
        let ctx = BackendContext {
            sessions: &NoApplications,
            prompt: &FixedAnswer(true),
            error_codes: &codes,
        };
        let mut roles = RoleMap::for_diff("a", "b");
        run(
            mode,
            &TargetExtension::new(ext),
            &mut roles,
            &ctx,
            &DriversConfig::default(),
        )
    }

    #[test]
    fn test_unsupported_extension_is_exit_2() {
        let err = dispatch(Mode::Diff, ".xlsx").unwrap_err();
        assert_eq!(err.outcome(), Outcome::UnsupportedExtension);
        let err = dispatch(Mode::Merge, "").unwrap_err();
        assert_eq!(err.outcome(), Outcome::UnsupportedExtension);
    }

    #[test]
    fn test_presentation_merge_is_unsupported() {
        let err = dispatch(Mode::Merge, ".pptx").unwrap_err();
        assert!(matches!(err, DriverError::UnsupportedExtension { .. }));
    }

    #[test]
    fn test_extension_case_must_match() {
        let err = dispatch(Mode::Diff, ".DOCX").unwrap_err();
        assert_eq!(err.outcome(), Outcome::UnsupportedExtension);
    }

    #[test]
    fn test_missing_application_is_exit_3() {
        for (mode, ext) in [(Mode::Diff, ".docx"), (Mode::Merge, ".doc"), (Mode::Diff, ".ppt")] {
            let err = dispatch(mode, ext).unwrap_err();
            assert_eq!(err.outcome(), Outcome::BackendUnavailable, "{mode} {ext}");
        }
    }
}
