use derive_more::{Display, From};

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Config(crate::config::ConfigError),

    #[from]
    Notes(crate::notes::NotesError),
}

impl std::error::Error for Error {}

impl Error {
    pub fn user_message(&self) -> String {
        match self {
            Error::Config(e) => e.user_message(),
            Error::Notes(e) => e.user_message(),
        }
    }
}
