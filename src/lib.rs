pub mod error;
pub mod gather;
pub mod lightmap_writer;
pub mod math;
pub mod mission;
pub mod processing;
pub mod types;

#[cfg(test)]
pub mod test_support;
