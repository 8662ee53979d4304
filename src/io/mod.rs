mod imprint;
mod input;
mod output;
pub(crate) mod settings;

pub use imprint::{write_footer, write_header};
pub use input::*;
pub use output::*;
pub use settings::{Configuration, ResponseConfig, JOBTYPES};
