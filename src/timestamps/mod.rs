//! Calendar dates embedded at the end of object file stems and supplied on
//! the command line
mod stamp;
mod util;
pub(crate) use self::stamp::*;
