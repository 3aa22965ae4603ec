use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::GrassError;
use crate::invocation::Invocation;
use crate::pipeline::steps::{self, CellType, Geometry};
use crate::pipeline::{Pipeline, Plan, distinct_layer, layer_name};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathParams {
    /// `r.watershed threshold`
    pub threshold: u64,
}

impl Default for PathParams {
    fn default() -> Self {
        Self { threshold: 5000 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathLayers {
    pub dem: String,
    /// Seed points the traced paths start from.
    pub heads: String,
    pub drainage: String,
    pub path_raster: String,
    pub path_vector: String,
    pub strahler: String,
    pub strahler_vector: String,
    pub above_stream: String,
}

impl PathLayers {
    /// Input layers that clash with an intermediate layer are suffixed with
    /// `_dem`, and the head points with `_heads` when they clash with the DEM.
    pub fn new(dem: impl Into<String>, heads: impl Into<String>) -> Self {
        let mut layers = Self {
            dem: String::new(),
            heads: String::new(),
            drainage: "dirs".into(),
            path_raster: "dem_stream".into(),
            path_vector: "dem_stream_vec".into(),
            strahler: "strahler".into(),
            strahler_vector: "dem_strahler_vec".into(),
            above_stream: "above_stream".into(),
        };
        let taken = layers.intermediates();
        let dem = distinct_layer(dem.into(), &taken, "_dem");
        let heads = distinct_layer(heads.into(), &taken, "_heads");
        // No intermediate ends in `_heads`, so this cannot reintroduce a clash.
        let heads = distinct_layer(heads, &[dem.as_str()], "_heads");
        layers.dem = dem;
        layers.heads = heads;
        layers
    }

    fn intermediates(&self) -> [&str; 6] {
        [
            self.drainage.as_str(),
            self.path_raster.as_str(),
            self.path_vector.as_str(),
            self.strahler.as_str(),
            self.strahler_vector.as_str(),
            self.above_stream.as_str(),
        ]
    }
}

/// Flow paths traced downslope from channel head points.
#[derive(Clone, Debug)]
pub struct Paths {
    input: PathBuf,
    heads: PathBuf,
    params: PathParams,
    layers: PathLayers,
}

impl Paths {
    pub fn new(
        input: impl Into<PathBuf>,
        heads: impl Into<PathBuf>,
        params: PathParams,
    ) -> Result<Self, GrassError> {
        let input = input.into();
        let heads = heads.into();
        if params.threshold == 0 {
            return Err(GrassError::InvalidParameter(
                "threshold must be greater than zero".into(),
            ));
        }

        Ok(Self {
            layers: PathLayers::new(layer_name(&input)?, layer_name(&heads)?),
            input,
            heads,
            params,
        })
    }

    pub fn layers(&self) -> &PathLayers {
        &self.layers
    }

    pub fn heads(&self) -> &Path {
        &self.heads
    }
}

impl Pipeline for Paths {
    fn name(&self) -> &'static str {
        "paths"
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
        plan.push(steps::import_vector(&self.heads, &l.heads));

        plan.announce(
            "Running watershed directions",
            Invocation::new("r.watershed")
                .flags("ams")
                .param("elevation", &l.dem)
                .param("threshold", self.params.threshold)
                .param("drainage", &l.drainage)
                .overwrite(),
        );

        plan.announce(
            "Running path tracing",
            Invocation::new("r.path")
                .param("input", &l.drainage)
                .param("start_points", &l.heads)
                .param("raster_path", &l.path_raster)
                .param("vector_path", &l.path_vector)
                .overwrite(),
        );

        plan.push(steps::strahler_order(&l.path_raster, &l.drainage, &l.strahler));
        plan.push(steps::to_vector(&l.strahler, &l.strahler_vector, Geometry::Line));
        plan.push(steps::height_above_stream(
            &l.path_raster,
            &l.drainage,
            &l.dem,
            &l.above_stream,
        ));

        plan.section("Exporting...");
        for (layer, file) in [
            (&l.path_vector, "stream_ln.shp"),
            (&l.strahler_vector, "strahler_ln.shp"),
        ] {
            let output = dst.join(file);
            plan.export(steps::export_shapefile(layer, &output, Geometry::Line), output);
        }
        let hand = dst.join("hand.tif");
        plan.export(
            steps::export_geotiff(&l.above_stream, CellType::Float64, &hand, true),
            hand,
        );

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Plan {
        Paths::new("/data/dem.tif", "/data/heads.shp", PathParams::default())
            .unwrap()
            .plan(Path::new("/out"))
    }

    #[test]
    fn traces_from_imported_head_points() {
        let plan = plan();
        let invocations: Vec<_> = plan.invocations().collect();
        let modules: Vec<_> = invocations.iter().map(|inv| inv.module()).collect();
        assert_eq!(
            modules,
            vec![
                "r.in.gdal",
                "v.in.ogr",
                "r.watershed",
                "r.path",
                "r.stream.order",
                "r.to.vect",
                "r.stream.distance",
                "v.out.ogr",
                "v.out.ogr",
                "r.out.gdal",
            ]
        );

        assert_eq!(invocations[1].get("output"), Some("heads"));
        assert_eq!(invocations[2].get("elevation"), Some("dem"));
        assert!(invocations[2].has_flag('s'));
        assert_eq!(invocations[3].get("start_points"), Some("heads"));
        assert_eq!(invocations[3].get("input"), Some("dirs"));
    }

    #[test]
    fn exports_the_layers_that_were_produced() {
        let plan = plan();
        let invocations: Vec<_> = plan.invocations().collect();
        let path_vector = invocations[3].get("vector_path");
        let strahler_vector = invocations[5].get("output");

        assert_eq!(invocations[7].get("input"), path_vector);
        assert_eq!(invocations[8].get("input"), strahler_vector);
        assert_eq!(invocations[9].get("input"), invocations[6].get("difference"));
        assert_eq!(
            plan.outputs(),
            [
                PathBuf::from("/out/stream_ln.shp"),
                PathBuf::from("/out/strahler_ln.shp"),
                PathBuf::from("/out/hand.tif"),
            ]
        );
    }

    #[test]
    fn head_layer_never_shadows_dem() {
        let paths = Paths::new("/data/site.tif", "/vectors/site.shp", PathParams::default())
            .unwrap();
        assert_eq!(paths.layers().dem, "site");
        assert_eq!(paths.layers().heads, "site_heads");
    }

    #[test]
    fn inputs_named_like_intermediates_are_renamed() {
        let paths = Paths::new("/data/dirs.tif", "/vectors/strahler.shp", PathParams::default())
            .unwrap();
        assert_eq!(paths.layers().dem, "dirs_dem");
        assert_eq!(paths.layers().heads, "strahler_heads");

        let plan = paths.plan(Path::new("/out"));
        let invocations: Vec<_> = plan.invocations().collect();
        assert_eq!(invocations[2].get("elevation"), Some("dirs_dem"));
        assert_eq!(invocations[2].get("drainage"), Some("dirs"));
        assert_eq!(invocations[3].get("start_points"), Some("strahler_heads"));
        assert_eq!(invocations[6].get("elevation"), Some("dirs_dem"));
    }
}
