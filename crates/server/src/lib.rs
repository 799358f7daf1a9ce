pub mod config;
pub mod error;
pub mod routes;
pub mod state;

#[cfg(test)]
mod test_support;
