//! CLI command implementations.
//!
//! | Module    | Commands handled                 |
//! |-----------|----------------------------------|
//! | `rebuild` | default run, `Abort`, `Status`   |
//! | `config`  | `Config`                         |

pub mod config;
pub mod rebuild;

pub use config::cmd_config;
pub use rebuild::{cmd_abort, cmd_run, cmd_status, install_interrupt_handler};
