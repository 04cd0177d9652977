//! Application runtime composition modules.

pub(crate) mod config_file;
pub(crate) mod runtime;
pub(crate) mod settings;
pub(crate) mod terminal;
