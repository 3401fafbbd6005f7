// Shared types for codeprep: data model, configuration, store and the
// message protocol between the app loop and the UI.

pub mod config;
pub mod db;
pub mod model;
pub mod protocol;
