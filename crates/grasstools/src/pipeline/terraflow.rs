use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::GrassError;
use crate::invocation::Invocation;
use crate::pipeline::steps::{self, CellType, Geometry};
use crate::pipeline::{Pipeline, Plan, distinct_layer, layer_name};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TerraflowParams {
    /// `r.watershed threshold`
    pub threshold: u64,
}

impl Default for TerraflowParams {
    fn default() -> Self {
        Self { threshold: 1500 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerraflowLayers {
    pub dem: String,
    pub accumulation: String,
    pub drainage: String,
    pub outlets: String,
    pub outlets_vector: String,
    pub basins: String,
}

impl TerraflowLayers {
    pub fn for_dem(dem: impl Into<String>) -> Self {
        let mut layers = Self {
            dem: String::new(),
            accumulation: "acc".into(),
            drainage: "dra".into(),
            outlets: "outlets".into(),
            outlets_vector: "outlets_vec".into(),
            basins: "bas".into(),
        };
        let taken = [
            layers.accumulation.as_str(),
            layers.drainage.as_str(),
            layers.outlets.as_str(),
            layers.outlets_vector.as_str(),
            layers.basins.as_str(),
        ];
        let dem = distinct_layer(dem.into(), &taken, "_dem");
        layers.dem = dem;
        layers
    }
}

/// First-order raster hydrography: accumulation, direction, outlets and the
/// basins draining to them. Outputs are prefixed with the DEM layer name.
#[derive(Clone, Debug)]
pub struct Terraflow {
    input: PathBuf,
    /// Output file prefix, the input's layer name before any renaming.
    prefix: String,
    params: TerraflowParams,
    layers: TerraflowLayers,
}

impl Terraflow {
    pub fn new(input: impl Into<PathBuf>, params: TerraflowParams) -> Result<Self, GrassError> {
        let input = input.into();
        if params.threshold == 0 {
            return Err(GrassError::InvalidParameter(
                "threshold must be greater than zero".into(),
            ));
        }
        let prefix = layer_name(&input)?;
        let layers = TerraflowLayers::for_dem(prefix.clone());
        Ok(Self {
            input,
            prefix,
            params,
            layers,
        })
    }

    pub fn layers(&self) -> &TerraflowLayers {
        &self.layers
    }
}

impl Pipeline for Terraflow {
    fn name(&self) -> &'static str {
        "terraflow"
    }

    fn input(&self) -> &Path {
        &self.input
    }

    fn layer(&self) -> &str {
        &self.layers.dem
    }

    fn plan(&self, dst: &Path) -> Plan {
        let l = &self.layers;
        let mut plan = Plan::new();

        plan.announce(
            format!("Loading DEM as layer {}", l.dem),
            steps::import_raster(&self.input, &l.dem),
        );
        plan.push(
            Invocation::new("r.watershed")
                .flags("am")
                .param("elevation", &l.dem)
                .param("threshold", self.params.threshold)
                .param("accumulation", &l.accumulation)
                .param("drainage", &l.drainage)
                .overwrite(),
        );

        // r.watershed marks cells draining out of the region with a negative direction.
        plan.announce(
            "Identify outlets by negative flow direction",
            Invocation::mapcalc(format!(
                "{} = if({} >= 0, null(), 1)",
                l.outlets, l.drainage
            )),
        );
        plan.announce(
            "Convert outlet raster to vector",
            steps::to_vector(&l.outlets, &l.outlets_vector, Geometry::Point),
        );
        plan.announce(
            "Delineate basins according to outlets",
            Invocation::new("r.stream.basins")
                .param("direction", &l.drainage)
                .param("points", &l.outlets_vector)
                .param("basins", &l.basins)
                .overwrite(),
        );

        plan.section("Exporting");
        for (layer, suffix, cell_type) in [
            (&l.outlets, "outlets", CellType::Float32),
            (&l.accumulation, "fac", CellType::Float64),
            (&l.drainage, "fdr", CellType::Float64),
            (&l.basins, "basins", CellType::Int16),
        ] {
            let output = dst.join(format!("{}_{suffix}.tif", self.prefix));
            plan.export(steps::export_geotiff(layer, cell_type, &output, false), output);
        }

        plan
    }
}
