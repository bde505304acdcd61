pub mod prlt;
