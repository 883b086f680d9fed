//! Terminal output for the CLI
//!
//! Styled `cliclack` output when attached to a terminal, plain prefixed
//! lines otherwise (CI, pipes, tests).

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_success, remark, step_info, step_ok_detail, step_warn, step_warn_hint,
};
pub use prompts::confirm;
