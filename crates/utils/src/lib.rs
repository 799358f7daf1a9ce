pub mod pagination;
pub mod response;
pub mod webhook_signature;
pub mod youtube;
