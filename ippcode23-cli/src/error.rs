use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("--help must be the only argument")]
    HelpNotAlone,

    #[error("at least one of --source or --input must be given")]
    NoSourceOrInput,

    #[error("{0}")]
    InvalidArguments(String),

    #[error("failed to open \"{path}\": {source}")]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error(transparent)]
    Load(#[from] ippcode23_loader::LoadError),

    #[error(transparent)]
    Runtime(#[from] ippcode23::RuntimeError),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Cli(CliError::HelpNotAlone)
            | Error::Cli(CliError::NoSourceOrInput)
            | Error::Cli(CliError::InvalidArguments(_)) => 10,
            Error::Cli(CliError::CannotOpen { .. }) => 11,
            Error::Load(err) => err.exit_code(),
            Error::Runtime(err) => err.exit_code(),
        }
    }
}
