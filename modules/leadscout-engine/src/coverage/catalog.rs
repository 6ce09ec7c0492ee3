//! Offline ZIP gazetteer: ZIP → (lat, lng, population, density). Pure read.

use std::collections::HashMap;

use tracing::{info, warn};

/// One gazetteer entry.
#[derive(Debug, Clone)]
pub struct ZipInfo {
    pub zip: String,
    pub lat: f64,
    pub lng: f64,
    pub population: u32,
    /// Population per square mile.
    pub density: f64,
}

pub struct ZipCatalog {
    by_zip: HashMap<String, ZipInfo>,
}

impl ZipCatalog {
    /// Load from `ZIP_GAZETTEER_PATH` when set, else the embedded dataset.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("ZIP_GAZETTEER_PATH") {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    let catalog = Self::from_csv(&text);
                    info!(path, zips = catalog.len(), "Loaded ZIP gazetteer from file");
                    return catalog;
                }
                Err(e) => {
                    warn!(path, error = %e, "Failed to read gazetteer file, using embedded data");
                }
            }
        }
        Self::embedded()
    }

    /// The dataset compiled into the binary.
    pub fn embedded() -> Self {
        Self::from_csv(include_str!("../../data/zip_gazetteer.csv"))
    }

    /// Parse `zip,lat,lng,population,density` CSV, skipping the header and
    /// malformed lines.
    pub fn from_csv(text: &str) -> Self {
        let mut by_zip = HashMap::new();
        for line in text.lines().skip(1) {
            let fields: Vec<&str> = line.trim().split(',').collect();
            if fields.len() != 5 {
                continue;
            }
            let (Ok(lat), Ok(lng), Ok(population), Ok(density)) = (
                fields[1].parse::<f64>(),
                fields[2].parse::<f64>(),
                fields[3].parse::<u32>(),
                fields[4].parse::<f64>(),
            ) else {
                continue;
            };
            let zip = fields[0].to_string();
            by_zip.insert(
                zip.clone(),
                ZipInfo {
                    zip,
                    lat,
                    lng,
                    population,
                    density,
                },
            );
        }
        Self { by_zip }
    }

    pub fn get(&self, zip: &str) -> Option<&ZipInfo> {
        self.by_zip.get(zip)
    }

    pub fn len(&self) -> usize {
        self.by_zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_zip.is_empty()
    }
}

/// Great-circle distance between two points, in miles.
pub fn haversine_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_MILES: f64 = 3958.8;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_loads() {
        let catalog = ZipCatalog::embedded();
        assert!(!catalog.is_empty());
        let beverly = catalog.get("90210").unwrap();
        assert!((beverly.lat - 34.09).abs() < 0.1);
        assert!(catalog.get("00000").is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let catalog = ZipCatalog::from_csv(
            "zip,lat,lng,population,density\n90210,34.09,-118.41,21741,3810.0\nbad,line\n",
        );
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn haversine_is_plausible() {
        // Downtown LA to Beverly Hills: roughly 10 miles.
        let d = haversine_miles(34.0522, -118.2437, 34.0901, -118.4065);
        assert!(d > 8.0 && d < 12.0, "got {d}");

        // Same point is zero.
        assert!(haversine_miles(30.0, -97.0, 30.0, -97.0) < 1e-9);
    }
}
