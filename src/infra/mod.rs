//! Clients for external services: social media platforms and secret storage.

pub mod discord {
    pub mod client;
}
pub mod keys;
pub mod linkedin {
    pub mod client;
}
