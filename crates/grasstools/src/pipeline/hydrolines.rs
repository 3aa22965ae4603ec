use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::GrassError;
use crate::invocation::Invocation;
use crate::pipeline::steps::{self, CellType, Geometry};
use crate::pipeline::{Pipeline, Plan, distinct_layer, layer_name};

/// Tuning parameters for stream centerline extraction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HydrolinesParams {
    /// `r.hydrodem mod`
    pub mod_cells: u32,
    /// `r.hydrodem size`
    pub size: u32,
    /// `r.watershed threshold`, also used by `r.stream.extract`
    pub threshold: u64,
    /// `r.stream.extract d8cut`
    pub d8cut: f64,
    /// `r.stream.extract mexp`
    pub mexp: f64,
    /// `r.stream.extract stream_length`
    pub stream_length: u32,
}

impl Default for HydrolinesParams {
    fn default() -> Self {
        Self {
            mod_cells: 10,
            size: 40,
            threshold: 5000,
            d8cut: 1_000_000.0,
            mexp: 1.2,
            stream_length: 100,
        }
    }
}

/// Layers handed between the hydrolines steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HydrolinesLayers {
    pub dem: String,
    pub hydrodem: String,
    /// Drainage direction from `r.watershed`.
    pub drainage: String,
    pub accumulation: String,
    /// Flow direction written by `r.stream.extract`.
    pub stream_direction: String,
    pub streams: String,
    pub streams_vector: String,
    pub strahler: String,
    pub strahler_vector: String,
    pub basins_elementary: String,
    pub basins_last: String,
    pub basins_elementary_vector: String,
    pub basins_last_vector: String,
    pub above_stream: String,
}

impl HydrolinesLayers {
    /// The DEM keeps its name unless it clashes with an intermediate layer,
    /// in which case it gets a `_dem` suffix.
    pub fn for_dem(dem: impl Into<String>) -> Self {
        let mut layers = Self {
            dem: String::new(),
            hydrodem: "hydem".into(),
            drainage: "dirs".into(),
            accumulation: "acc".into(),
            stream_direction: "dirs_".into(),
            streams: "hydem_streams".into(),
            streams_vector: "hydem_streams_vec".into(),
            strahler: "strahler".into(),
            strahler_vector: "strahler_vec".into(),
            basins_elementary: "basins_elem".into(),
            basins_last: "basins_last".into(),
            basins_elementary_vector: "basin_elem_vec".into(),
            basins_last_vector: "basin_last_vec".into(),
            above_stream: "above_stream".into(),
        };
        let dem = distinct_layer(dem.into(), &layers.intermediates(), "_dem");
        layers.dem = dem;
        layers
    }

    fn intermediates(&self) -> [&str; 13] {
        [
            self.hydrodem.as_str(),
            self.drainage.as_str(),
            self.accumulation.as_str(),
            self.stream_direction.as_str(),
            self.streams.as_str(),
            self.streams_vector.as_str(),
            self.strahler.as_str(),
            self.strahler_vector.as_str(),
            self.basins_elementary.as_str(),
            self.basins_last.as_str(),
            self.basins_elementary_vector.as_str(),
            self.basins_last_vector.as_str(),
            self.above_stream.as_str(),
        ]
    }
}

/// Stream centerlines, Strahler order, basins and height above stream.
#[derive(Clone, Debug)]
pub struct Hydrolines {
    input: PathBuf,
    params: HydrolinesParams,
    layers: HydrolinesLayers,
}

impl Hydrolines {
    pub fn new(input: impl Into<PathBuf>, params: HydrolinesParams) -> Result<Self, GrassError> {
        let input = input.into();
        if params.threshold == 0 {
            return Err(GrassError::InvalidParameter(
                "threshold must be greater than zero".into(),
            ));
        }
        let layers = HydrolinesLayers::for_dem(layer_name(&input)?);
        Ok(Self {
            input,
            params,
            layers,
        })
    }

    pub fn layers(&self) -> &HydrolinesLayers {
        &self.layers
    }

    pub fn params(&self) -> &HydrolinesParams {
        &self.params
    }
}

impl Pipeline for Hydrolines {
    fn name(&self) -> &'static str {
        "hydrolines"
    }

    fn input(&self) -> &Path {
        &self.input
    }

    fn layer(&self) -> &str {
        &self.layers.dem
    }

    fn plan(&self, dst: &Path) -> Plan {
        let p = &self.params;
        let l = &self.layers;
        let mut plan = Plan::new();

        plan.announce(
            format!("Loading DEM as layer {}", l.dem),
            steps::import_raster(&self.input, &l.dem),
        );

        plan.announce(
            "Running hydrodem",
            Invocation::new("r.hydrodem")
                .param("input", &l.dem)
                .param("output", &l.hydrodem)
                .param("mod", p.mod_cells)
                .param("size", p.size)
                .overwrite(),
        );

        plan.announce(
            "Running watershed directions",
            Invocation::new("r.watershed")
                .flags("am")
                .param("elevation", &l.hydrodem)
                .param("threshold", p.threshold)
                .param("drainage", &l.drainage)
                .overwrite(),
        );

        plan.announce(
            "Running watershed accumulation",
            Invocation::new("r.watershed")
                .flags("am")
                .param("elevation", &l.hydrodem)
                .param("threshold", p.threshold)
                .param("accumulation", &l.accumulation)
                .overwrite(),
        );

        plan.announce(
            "Running stream extract",
            Invocation::new("r.stream.extract")
                .param("elevation", &l.hydrodem)
                .param("accumulation", &l.accumulation)
                .param("direction", &l.stream_direction)
                .param("threshold", p.threshold)
                .param("d8cut", p.d8cut)
                .param("mexp", p.mexp)
                .param("stream_length", p.stream_length)
                .param("stream_raster", &l.streams)
                .param("stream_vector", &l.streams_vector)
                .overwrite(),
        );

        plan.announce(
            "Running stream order",
            steps::strahler_order(&l.streams, &l.stream_direction, &l.strahler),
        );
        plan.push(steps::to_vector(&l.strahler, &l.strahler_vector, Geometry::Line));

        plan.announce(
            "Running stream basins",
            basins(&l.drainage, &l.streams, &l.basins_elementary, false),
        );
        plan.push(basins(&l.drainage, &l.streams, &l.basins_last, true));
        plan.push(steps::to_vector(
            &l.basins_elementary,
            &l.basins_elementary_vector,
            Geometry::Area,
        ));
        plan.push(steps::to_vector(
            &l.basins_last,
            &l.basins_last_vector,
            Geometry::Area,
        ));

        plan.announce(
            "Running stream distance",
            steps::height_above_stream(&l.streams, &l.drainage, &l.dem, &l.above_stream),
        );

        plan.section("Exporting");
        for (layer, file) in [(&l.accumulation, "fac.tif"), (&l.drainage, "dirs.tif")] {
            let output = dst.join(file);
            plan.export(
                steps::export_geotiff(layer, CellType::Float64, &output, true),
                output,
            );
        }
        for (layer, file, geometry) in [
            (&l.streams_vector, "stream_ln.shp", Geometry::Line),
            (&l.strahler_vector, "strahler_ln.shp", Geometry::Line),
            (&l.basins_last_vector, "basin_last_ply.shp", Geometry::Area),
            (&l.basins_elementary_vector, "basin_elem_ply.shp", Geometry::Area),
        ] {
            let output = dst.join(file);
            plan.export(steps::export_shapefile(layer, &output, geometry), output);
        }
        let hand = dst.join("hand.tif");
        plan.export(
            steps::export_geotiff(&l.above_stream, CellType::Float64, &hand, true),
            hand,
        );

        plan
    }
}

/// `r.stream.basins`; `last` keeps only the basins of last-order streams.
fn basins(direction: &str, streams: &str, output: &str, last: bool) -> Invocation {
    let invocation = Invocation::new("r.stream.basins");
    let invocation = if last { invocation.flags("l") } else { invocation };
    invocation
        .param("direction", direction)
        .param("stream_rast", streams)
        .param("basins", output)
        .overwrite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RecordingEngine;

    fn pipeline() -> Hydrolines {
        Hydrolines::new("/data/dem.tif", HydrolinesParams::default()).unwrap()
    }

    #[test]
    fn issues_expected_module_sequence() {
        let engine = RecordingEngine::new();
        pipeline().run(&engine, Path::new("/out")).unwrap();

        assert_eq!(
            engine.modules(),
            vec![
                "r.in.gdal",
                "r.hydrodem",
                "r.watershed",
                "r.watershed",
                "r.stream.extract",
                "r.stream.order",
                "r.to.vect",
                "r.stream.basins",
                "r.stream.basins",
                "r.to.vect",
                "r.to.vect",
                "r.stream.distance",
                "r.out.gdal",
                "r.out.gdal",
                "v.out.ogr",
                "v.out.ogr",
                "v.out.ogr",
                "v.out.ogr",
                "r.out.gdal",
            ]
        );
    }

    #[test]
    fn parameters_reach_their_modules() {
        let params = HydrolinesParams {
            mod_cells: 4,
            size: 20,
            threshold: 800,
            d8cut: 5000.0,
            mexp: 0.0,
            stream_length: 25,
        };
        let plan = Hydrolines::new("/data/dem.tif", params)
            .unwrap()
            .plan(Path::new("/out"));
        let invocations: Vec<_> = plan.invocations().collect();

        assert_eq!(invocations[1].get("mod"), Some("4"));
        assert_eq!(invocations[1].get("size"), Some("20"));
        assert_eq!(invocations[2].get("threshold"), Some("800"));
        assert!(invocations[2].has_flag('a') && invocations[2].has_flag('m'));
        let extract = invocations[4];
        assert_eq!(extract.get("d8cut"), Some("5000"));
        assert_eq!(extract.get("mexp"), Some("0"));
        assert_eq!(extract.get("stream_length"), Some("25"));
        assert_eq!(extract.get("threshold"), Some("800"));
    }

    #[test]
    fn layers_flow_between_steps() {
        let plan = pipeline().plan(Path::new("/out"));
        let invocations: Vec<_> = plan.invocations().collect();

        assert_eq!(invocations[0].get("output"), Some("dem"));
        assert_eq!(invocations[1].get("input"), Some("dem"));
        assert_eq!(invocations[2].get("drainage"), Some("dirs"));
        assert_eq!(invocations[3].get("accumulation"), Some("acc"));

        let extract = invocations[4];
        assert_eq!(extract.get("accumulation"), Some("acc"));
        assert_eq!(extract.get("direction"), Some("dirs_"));

        assert_eq!(invocations[5].get("direction"), Some("dirs_"));
        assert_eq!(invocations[7].get("direction"), Some("dirs"));
        assert!(!invocations[7].has_flag('l'));
        assert!(invocations[8].has_flag('l'));
        assert_eq!(invocations[8].get("basins"), Some("basins_last"));
        assert_eq!(invocations[11].get("elevation"), Some("dem"));
        assert_eq!(invocations[11].get("difference"), Some("above_stream"));
        assert!(plan.invocations().all(|inv| inv.is_overwrite()));
    }

    #[test]
    fn exports_land_in_output_directory() {
        let plan = pipeline().plan(Path::new("/out"));
        assert_eq!(
            plan.outputs(),
            [
                "fac.tif",
                "dirs.tif",
                "stream_ln.shp",
                "strahler_ln.shp",
                "basin_last_ply.shp",
                "basin_elem_ply.shp",
                "hand.tif",
            ]
            .map(|file| Path::new("/out").join(file))
            .as_slice()
        );
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let params = HydrolinesParams {
            threshold: 0,
            ..HydrolinesParams::default()
        };
        assert!(Hydrolines::new("/data/dem.tif", params).is_err());
    }

    #[test]
    fn dem_named_like_an_intermediate_is_not_overwritten() {
        let pipeline = Hydrolines::new("/data/acc.tif", HydrolinesParams::default()).unwrap();
        assert_eq!(pipeline.layers().dem, "acc_dem");

        let plan = pipeline.plan(Path::new("/out"));
        let invocations: Vec<_> = plan.invocations().collect();
        assert_eq!(invocations[0].get("output"), Some("acc_dem"));
        assert_eq!(invocations[1].get("input"), Some("acc_dem"));
        assert_eq!(invocations[3].get("accumulation"), Some("acc"));
        let distance = invocations
            .iter()
            .find(|inv| inv.module() == "r.stream.distance")
            .unwrap();
        assert_eq!(distance.get("elevation"), Some("acc_dem"));
    }
}
