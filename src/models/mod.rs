//! Model management module
//!
//! Provides functionality for:
//! - Listing installed model files and detecting the active model
//! - Fetching model files from the HuggingFace Hub
//! - Reading GGUF header metadata (context length)

pub mod hub;
pub mod inventory;
pub mod metadata;

pub use hub::{ByteStream, HfHub, HubDownload, ModelHub};
pub use inventory::{InstalledModel, list_installed_models, resolve_active_model};
pub use metadata::{DEFAULT_CONTEXT_LENGTH, ModelMetadata, context_length_or, find_context_length};
