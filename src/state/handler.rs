// ABOUTME: Reader/writer traits every state backend implements
// ABOUTME: Typed getters and setters validate the argument type before touching storage

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::archive;
use super::error::{Result, StateError};
use super::value::StateValue;
use crate::pipeline::{Argument, ArgumentType};

/// Read side of a state backend.
///
/// Backends implement [`read`](StateReader::read) and
/// [`exists`](StateReader::exists); the typed getters are provided on top.
/// Backends that can hold packaged directories also implement
/// [`read_archive`](StateReader::read_archive).
#[async_trait]
pub trait StateReader: Send + Sync {
    async fn read(&self, argument: &Argument) -> Result<StateValue>;

    async fn exists(&self, argument: &Argument) -> Result<bool>;

    async fn read_archive(&self, argument: &Argument) -> Result<Vec<u8>> {
        let _ = argument;
        Err(StateError::Unsupported {
            operation: "Reading packaged directories",
        })
    }

    async fn get_string(&self, argument: &Argument) -> Result<String> {
        expect_type(argument, &[ArgumentType::String, ArgumentType::Secret])?;
        self.read(argument).await?.into_string(argument)
    }

    async fn get_int64(&self, argument: &Argument) -> Result<i64> {
        expect_type(argument, &[ArgumentType::Int64])?;
        self.read(argument).await?.into_int64(argument)
    }

    async fn get_float64(&self, argument: &Argument) -> Result<f64> {
        expect_type(argument, &[ArgumentType::Float64])?;
        self.read(argument).await?.into_float64(argument)
    }

    async fn get_bool(&self, argument: &Argument) -> Result<bool> {
        expect_type(argument, &[ArgumentType::Bool])?;
        self.read(argument).await?.into_bool(argument)
    }

    async fn get_file(&self, argument: &Argument) -> Result<PathBuf> {
        expect_type(argument, &[ArgumentType::File])?;
        Ok(PathBuf::from(self.read(argument).await?.into_string(argument)?))
    }

    /// Unpackaged directories resolve to the recorded path. Packaged
    /// directories are extracted into a fresh directory on every call.
    async fn get_directory(&self, argument: &Argument) -> Result<PathBuf> {
        expect_type(
            argument,
            &[ArgumentType::PackagedDir, ArgumentType::UnpackagedDir],
        )?;

        if argument.kind == ArgumentType::UnpackagedDir {
            return Ok(PathBuf::from(
                self.read(argument).await?.into_string(argument)?,
            ));
        }

        let data = self.read_archive(argument).await?;
        let dest = archive::scratch_dir();
        archive::unpack(data, &dest).await?;
        debug!(argument = %argument, path = %dest.display(), "Extracted packaged directory");
        Ok(dest)
    }
}

/// Write side of a state backend.
#[async_trait]
pub trait StateWriter: Send + Sync {
    async fn write(&self, argument: &Argument, value: StateValue) -> Result<()>;

    async fn write_archive(&self, argument: &Argument, data: Vec<u8>) -> Result<()> {
        let _ = (argument, data);
        Err(StateError::Unsupported {
            operation: "Storing packaged directories",
        })
    }

    async fn set_string(&self, argument: &Argument, value: &str) -> Result<()> {
        expect_type(argument, &[ArgumentType::String, ArgumentType::Secret])?;
        self.write(argument, StateValue::String(value.to_string()))
            .await
    }

    async fn set_int64(&self, argument: &Argument, value: i64) -> Result<()> {
        expect_type(argument, &[ArgumentType::Int64])?;
        self.write(argument, StateValue::Int64(value)).await
    }

    async fn set_float64(&self, argument: &Argument, value: f64) -> Result<()> {
        expect_type(argument, &[ArgumentType::Float64])?;
        if !value.is_finite() {
            return Err(StateError::InvalidValue {
                key: argument.key.clone(),
                reason: format!("{value} cannot be stored"),
            });
        }
        self.write(argument, StateValue::Float64(value)).await
    }

    async fn set_bool(&self, argument: &Argument, value: bool) -> Result<()> {
        expect_type(argument, &[ArgumentType::Bool])?;
        self.write(argument, StateValue::Bool(value)).await
    }

    async fn set_file(&self, argument: &Argument, path: &Path) -> Result<()> {
        expect_type(argument, &[ArgumentType::File])?;
        self.write(argument, path_value(path)).await
    }

    /// Packaged directories are archived into the backend; the original path
    /// is recorded either way.
    async fn set_directory(&self, argument: &Argument, path: &Path) -> Result<()> {
        expect_type(
            argument,
            &[ArgumentType::PackagedDir, ArgumentType::UnpackagedDir],
        )?;

        if argument.kind == ArgumentType::PackagedDir {
            let data = archive::pack(path).await?;
            self.write_archive(argument, data).await?;
        }
        self.write(argument, path_value(path)).await
    }
}

/// A full read/write state backend.
pub trait StateHandler: StateReader + StateWriter {}

impl<T: StateReader + StateWriter + ?Sized> StateHandler for T {}

/// Fail with [`StateError::TypeMismatch`] unless `argument` has one of `allowed` types.
pub fn expect_type(argument: &Argument, allowed: &[ArgumentType]) -> Result<()> {
    if allowed.contains(&argument.kind) {
        return Ok(());
    }

    let expected = allowed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ");
    Err(StateError::TypeMismatch {
        argument: argument.clone(),
        expected,
    })
}

fn path_value(path: &Path) -> StateValue {
    StateValue::String(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryState;

    #[tokio::test]
    async fn test_accessor_rejects_wrong_type() {
        let state = MemoryState::new();
        let count = Argument::int64("count");

        let err = state.set_string(&count, "three").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument 'count (int64)' does not match expected type string or secret"
        );
        assert!(matches!(
            state.get_bool(&count).await,
            Err(StateError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_secret_reads_as_string() {
        let state = MemoryState::new();
        let token = Argument::secret("token");
        state.set_string(&token, "hunter2").await.unwrap();
        assert_eq!(state.get_string(&token).await.unwrap(), "hunter2");
    }

    #[tokio::test]
    async fn test_unpackaged_directory_is_a_path() {
        let state = MemoryState::new();
        let source = Argument::unpackaged_dir("source");
        state
            .set_directory(&source, Path::new("/workspace/src"))
            .await
            .unwrap();
        assert_eq!(
            state.get_directory(&source).await.unwrap(),
            PathBuf::from("/workspace/src")
        );
    }
}
