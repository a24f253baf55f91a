//! Region binding: fix the analysis window for the whole run.

use tscube_core::region::Region;
use tscube_io::raster::RegionSource;

use crate::error::{ExecError, Result};

/// Resolve and validate the active region before any raster is opened.
pub fn bind_region(source: &dyn RegionSource) -> Result<Region> {
    let region = source.active_region()?;
    region
        .validate()
        .map_err(|e| ExecError::Precondition(e.to_string()))?;
    Ok(region)
}
