// ABOUTME: Interactive fallback reader asking the user for missing argument values
// ABOUTME: Reads one line per request from stdin or any other async buffered reader

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use super::error::{Result, StateError};
use super::handler::{expect_type, StateReader};
use super::value::StateValue;
use crate::pipeline::{Argument, ArgumentType};

pub struct PromptReader<R> {
    // Holds both ends so concurrent prompts do not interleave.
    io: Mutex<(R, Box<dyn AsyncWrite + Send + Unpin>)>,
}

impl PromptReader<BufReader<Stdin>> {
    /// Prompt on stderr, read answers from stdin.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

impl<R> PromptReader<R>
where
    R: AsyncBufRead + Send + Unpin,
{
    pub fn new(input: R, output: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            io: Mutex::new((input, Box::new(output))),
        }
    }

    async fn ask(&self, argument: &Argument) -> Result<String> {
        let mut io = self.io.lock().await;
        let (input, output) = &mut *io;

        let message = format!(
            "Argument '{}' requested but not found. Please provide a value: ",
            argument.key
        );
        output.write_all(message.as_bytes()).await?;
        output.flush().await?;

        let mut line = String::new();
        input.read_line(&mut line).await?;
        let answer = line.trim_end_matches(['\r', '\n']);
        if answer.is_empty() {
            return Err(StateError::not_found(&argument.key));
        }
        Ok(answer.to_string())
    }
}

#[async_trait]
impl<R> StateReader for PromptReader<R>
where
    R: AsyncBufRead + Send + Unpin,
{
    async fn read(&self, argument: &Argument) -> Result<StateValue> {
        let answer = self.ask(argument).await?;
        StateValue::parse(argument, &answer)
    }

    /// Nothing is known up front; values only exist once asked for.
    async fn exists(&self, _argument: &Argument) -> Result<bool> {
        Ok(false)
    }

    async fn get_directory(&self, argument: &Argument) -> Result<PathBuf> {
        expect_type(
            argument,
            &[ArgumentType::PackagedDir, ArgumentType::UnpackagedDir],
        )?;
        Ok(PathBuf::from(self.ask(argument).await?))
    }
}
