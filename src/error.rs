use thiserror::Error;

#[derive(Debug, Error)]
pub enum FelonEntrepreneurError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, FelonEntrepreneurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_error_display() {
        let err = FelonEntrepreneurError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));
        let err = FelonEntrepreneurError::Auth("bad code".to_string());
        assert!(format!("{err}").contains("auth error"));
    }
}
