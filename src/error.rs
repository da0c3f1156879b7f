use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("cannot parse remote: {0}")]
    Parse(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Network(String),

    #[error("git: {0}")]
    GitCommand(String),

    #[error("loading #{number} failed: {source}")]
    PartialDetail {
        number: u64,
        #[source]
        source: Box<WatchError>,
    },

    #[error("editor: {0}")]
    Editor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    pub fn partial_detail(number: u64, source: WatchError) -> Self {
        WatchError::PartialDetail {
            number,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
