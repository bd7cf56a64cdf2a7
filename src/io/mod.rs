pub mod reader;
pub mod writer;

pub use reader::RequestReader;
pub use writer::ResponseWriter;

pub(crate) const CRLF: &[u8] = b"\r\n";
