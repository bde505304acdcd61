pub mod format;
pub mod qc;
pub mod timing;
