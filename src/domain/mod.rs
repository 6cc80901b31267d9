pub mod band;
pub mod bundle;
pub mod series;

pub use band::*;
pub use bundle::*;
pub use series::*;
