pub mod backup;
pub mod config;
pub mod errors;
pub mod rebuild;
pub mod resolver;
pub mod rules;
pub mod status;
pub mod ui;
pub mod vcs;
