pub mod daemon;
pub mod dh;
pub mod init;
pub mod keygen;
pub mod version;

pub use daemon::Daemon;
pub use dh::Dh;
pub use init::Init;
pub use keygen::Keygen;
pub use version::Version;
