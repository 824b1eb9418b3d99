use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not load the catalog or processed-cache")]
    Load,
    #[display("could not set up the build pipeline")]
    Pipeline,
    #[display("could not write results")]
    Persist,
}
