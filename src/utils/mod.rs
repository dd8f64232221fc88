pub mod c32;
