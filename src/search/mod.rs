pub mod bfs;
pub mod error;
pub mod minimize;
pub mod random;
pub mod results;

#[cfg(test)]
mod tests;
