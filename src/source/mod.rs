pub mod reader;

pub use reader::FileReader;
