// ABOUTME: Typed state store steps use to exchange argument values
// ABOUTME: Handler traits, backends, fallback readers and the composite fallback/cache-fill state

pub mod archive;
pub mod argmap;
pub mod composite;
pub mod error;
pub mod filesystem;
pub mod handler;
pub mod memory;
pub mod object;
pub mod observer;
pub mod prompt;
pub mod uri;
pub mod value;

pub use argmap::ArgMap;
pub use composite::State;
pub use error::{Result, StateError};
pub use filesystem::FilesystemState;
pub use handler::{StateHandler, StateReader, StateWriter};
pub use memory::MemoryState;
pub use object::{LocalObjectStore, ObjectStorageState, ObjectStore};
pub use observer::Observer;
pub use prompt::PromptReader;
pub use uri::open;
pub use value::{StateValue, StoredValue};
