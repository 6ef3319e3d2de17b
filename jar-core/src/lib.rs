pub mod archive;
pub mod errors;
pub mod filter;
pub mod history;
pub mod models;
pub mod protocol;

pub use archive::*;
pub use errors::*;
pub use filter::*;
pub use history::*;
pub use models::*;
pub use protocol::*;

pub type JarResult<T> = Result<T, JarError>;
