use cdp_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("browser call failed: {0}")]
    Adapter(#[from] AdapterError),
    #[error("extraction script returned {0}, expected an object")]
    UnexpectedShape(String),
    #[error("no readable content on {url}")]
    Empty { url: String },
}
