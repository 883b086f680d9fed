//! Interactive vs. non-interactive detection

use std::io::IsTerminal;

/// Environment variables set by common CI systems
const CI_VARS: [&str; 9] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// Decides how the CLI talks to the user
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Interactive only with a TTY on both ends and no CI marker
    pub fn detect() -> Self {
        let tty = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: tty && !ci,
            auto_yes: false,
        }
    }

    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Answer yes to every prompt
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.is_interactive());
        assert!(!ctx.auto_yes());
        assert!(ctx.with_auto_yes(true).auto_yes());
    }
}
