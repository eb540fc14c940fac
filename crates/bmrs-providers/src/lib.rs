pub mod assembler;
pub mod elexon;
pub mod error;
pub mod normalize;
pub mod provider;

#[cfg(test)]
mod testing;
