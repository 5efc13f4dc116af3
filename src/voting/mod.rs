pub mod quality;
pub mod results;
pub mod tally;

pub use quality::verify;
pub use results::compose;
