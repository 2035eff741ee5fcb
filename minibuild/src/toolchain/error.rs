#[derive(Debug)]
pub enum ErrorKind {
    IOError,
    ArchitectureInvalid,
    EnvVarNotFound,
    ToolExecError,
    ToolNotFound,
    InvalidArgument,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Error { kind, message: message.to_owned() }
    }

    pub fn io(message: impl AsRef<str>) -> Self {
        Self::new(ErrorKind::IOError, message.as_ref())
    }

    pub fn invalid_arch(message: impl AsRef<str>) -> Self {
        Self::new(ErrorKind::ArchitectureInvalid, message.as_ref())
    }

    pub fn invalid_arg(message: impl AsRef<str>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message.as_ref())
    }

    pub fn env_not_found(message: impl AsRef<str>) -> Self {
        Self::new(ErrorKind::EnvVarNotFound, message.as_ref())
    }

    pub fn tool_not_found(message: impl AsRef<str>) -> Self {
        Self::new(ErrorKind::ToolNotFound, message.as_ref())
    }

    pub fn tool_exec(message: impl AsRef<str>) -> Self {
        Self::new(ErrorKind::ToolExecError, message.as_ref())
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::tool_not_found(e.to_string()),
            _ => Error::io(e.to_string()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
