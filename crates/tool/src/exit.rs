//! Process exit statuses.

use clap::error::ErrorKind;
use std::fmt;

/// How a run of the tool ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    Help,
    UnknownArgument,
    /// No image writer for the requested output.
    UnknownTarget,
    MissingArgument,
    FileNotFound,
    BadVersion,
    RenderFailure,
    BadCanvas,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::Help => 1,
            ExitStatus::UnknownArgument => 2,
            ExitStatus::UnknownTarget => 3,
            ExitStatus::MissingArgument => 5,
            ExitStatus::FileNotFound => 6,
            ExitStatus::BadVersion => 7,
            ExitStatus::RenderFailure => 8,
            ExitStatus::BadCanvas => 9,
        }
    }

    /// The status for an argument parsing outcome.
    pub fn from_clap(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                ExitStatus::Help
            }
            ErrorKind::DisplayVersion => ExitStatus::Ok,
            ErrorKind::MissingRequiredArgument => ExitStatus::MissingArgument,
            _ => ExitStatus::UnknownArgument,
        }
    }
}

/// An error together with the status the process should exit with.
#[derive(Debug)]
pub struct Failure {
    pub status: ExitStatus,
    pub error: anyhow::Error,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl std::error::Error for Failure {}

/// Attach an exit status to a fallible result.
pub trait WithStatus<T> {
    fn status(self, status: ExitStatus) -> Result<T, Failure>;
}

impl<T, E: Into<anyhow::Error>> WithStatus<T> for Result<T, E> {
    fn status(self, status: ExitStatus) -> Result<T, Failure> {
        self.map_err(|err| Failure {
            status,
            error: err.into(),
        })
    }
}
