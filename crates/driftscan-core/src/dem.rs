use crate::error::{DriftscanError, Result};

/// A digital elevation model known to the processor.
#[derive(Clone, Debug)]
pub struct DemDescriptor {
    pub name: String,
    /// Nominal posting in meters.
    pub posting_m: f64,
    /// Ground-coordinate coverage (min_x, min_y, max_x, max_y); `None`
    /// means global.
    pub coverage: Option<(f64, f64, f64, f64)>,
}

impl DemDescriptor {
    /// Whether the DEM fully covers a scene bounding box.
    pub fn covers(&self, bbox: (f64, f64, f64, f64)) -> bool {
        match self.coverage {
            None => true,
            Some((min_x, min_y, max_x, max_y)) => {
                bbox.0 >= min_x && bbox.1 >= min_y && bbox.2 <= max_x && bbox.3 <= max_y
            }
        }
    }

    /// Whether a single ground point has elevation data.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self.coverage {
            None => true,
            Some((min_x, min_y, max_x, max_y)) => {
                x >= min_x && x <= max_x && y >= min_y && y <= max_y
            }
        }
    }
}

/// Registry of DEM identifiers the coregistration and terrain stages accept.
#[derive(Clone, Debug)]
pub struct DemCatalog {
    entries: Vec<DemDescriptor>,
}

impl DemCatalog {
    /// The identifiers a stock install knows about.
    pub fn builtin() -> Self {
        let entries = vec![
            DemDescriptor {
                name: "SRTM 3Sec".to_string(),
                posting_m: 90.0,
                coverage: None,
            },
            DemDescriptor {
                name: "SRTM 1Sec HGT".to_string(),
                posting_m: 30.0,
                coverage: None,
            },
            DemDescriptor {
                name: "Copernicus 30m".to_string(),
                posting_m: 30.0,
                coverage: None,
            },
        ];
        Self { entries }
    }

    pub fn with_entry(mut self, entry: DemDescriptor) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn lookup(&self, name: &str) -> Result<&DemDescriptor> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| DriftscanError::Coverage(format!("unknown DEM '{}'", name)))
    }
}

impl Default for DemCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
