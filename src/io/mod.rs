mod fcidump;
mod imprint;
pub(crate) mod settings;

pub use fcidump::{parse_fcidump, read_fcidump};
pub use imprint::{write_footer, write_header};
pub use settings::Configuration;
