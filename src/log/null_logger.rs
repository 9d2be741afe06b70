//! Stands in for the `log4rs` backend when the `logging` feature is off. Nothing is printed.

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}
