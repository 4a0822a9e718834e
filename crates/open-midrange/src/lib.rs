//! OpenMidrange library: configuration, output and command implementations
//! shared by the `open-midrange` binary and its tests.

pub mod commands;
pub mod config;
pub mod output;

use std::sync::Arc;

use open_midrange_ccsid::{CcsidError, ConvTable, TableRegistry};

/// Resolve a `--ccsid` argument: a bare number is a CCSID, anything else is
/// an encoding name. `None` falls back to `default_ccsid`.
pub fn resolve_table(
    registry: &TableRegistry,
    arg: Option<&str>,
    default_ccsid: u16,
) -> Result<Arc<ConvTable>, CcsidError> {
    match arg {
        None => registry.table(default_ccsid),
        Some(value) => match value.trim().parse::<u16>() {
            Ok(ccsid) => registry.table(ccsid),
            Err(_) => registry.table_by_name(value),
        },
    }
}
