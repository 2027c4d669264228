//! The `utils` module provides the pieces shared by every layer of the
//! broker: the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, WampError};

#[cfg(test)]
mod tests {
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
        logging::init("nonsense");
    }
}
