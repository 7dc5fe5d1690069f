pub mod conditionals;
pub mod for_each;
