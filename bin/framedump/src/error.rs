use jvm_frames::jvm;
use std::io;

/// Ways dumping the frames of a listing can go wrong
#[derive(Debug)]
pub enum DumpError {
    Io(io::Error),

    /// Listing could not be parsed
    Syntax { line: usize, message: String },

    /// Frames could not be computed for a method
    Analysis { method: String, error: jvm::Error },
}

impl DumpError {
    pub fn syntax(line: usize, message: impl Into<String>) -> DumpError {
        DumpError::Syntax {
            line,
            message: message.into(),
        }
    }
}

impl From<io::Error> for DumpError {
    fn from(err: io::Error) -> DumpError {
        DumpError::Io(err)
    }
}

pub enum DumpOutcome {
    /// Frames were computed for every method
    Ok,

    /// Some method is malformed
    Fail(String),

    /// The listing itself could not be read
    Error(String),
}

impl From<DumpError> for DumpOutcome {
    fn from(err: DumpError) -> DumpOutcome {
        match err {
            DumpError::Io(io_err) => DumpOutcome::Error(format!("IO - {:?}", io_err)),
            DumpError::Syntax { line, message } => {
                DumpOutcome::Error(format!("Syntax - line {}: {}", line, message))
            }
            DumpError::Analysis { method, error } => {
                let location = match error.index() {
                    Some(index) => format!(" at node {}", index),
                    None => String::new(),
                };
                DumpOutcome::Fail(format!("Analysis - {}{}: {:?}", method, location, error))
            }
        }
    }
}
