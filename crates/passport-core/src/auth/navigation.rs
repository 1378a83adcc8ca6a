use tracing::info;

/// Where the user agent is sent after sign-out or account closure.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);

    /// Location to come back to after signing in again, if the host has one
    fn current_location(&self) -> Option<String> {
        None
    }
}

/// Invoked by [`SessionManager::sign_out`](super::SessionManager::sign_out)
/// in place of a redirect.
pub type SignOutCallback = Box<dyn FnOnce() + Send>;

/// Navigator for hosts without a user agent: the target is only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &str) {
        info!(url, "Navigation requested");
    }
}
