pub(crate) mod fallback_controller;
pub(crate) mod file_controller;
