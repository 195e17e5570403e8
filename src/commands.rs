pub mod batch;
pub mod check;
pub mod fetch;
pub mod stats;
pub mod track;
