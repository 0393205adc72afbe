pub mod card;
pub mod registration;

#[cfg(test)]
mod tests;

pub use card::*;
pub use registration::*;
