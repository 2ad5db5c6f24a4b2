pub mod utils {
    pub mod clock;
    pub mod config;
    pub mod constants;
    pub mod enums;
    pub mod errors;
    pub mod logger;
    pub mod types;
}
pub mod core {
    pub mod client;
    pub mod codec;
    pub mod server;
    pub mod session;
    pub mod shell;
}
pub mod database {
    pub mod mailbox;
    pub mod models;
    pub mod registry;
}
