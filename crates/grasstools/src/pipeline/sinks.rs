use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::GrassError;
use crate::invocation::Invocation;
use crate::pipeline::steps::{self, Geometry};
use crate::pipeline::{Pipeline, Plan, distinct_layer, layer_name};

/// Sink detection thresholds, in elevation units.
///
/// See USGS SIR 2010-5059 for the approach.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SinkParams {
    /// Sinks no deeper than this are ignored.
    pub min_depth: f64,
    /// Sinks deeper than this go into the sink mask.
    pub mask_depth: f64,
    /// Number of `r.fill.dir` passes.
    pub passes: u32,
}

impl Default for SinkParams {
    fn default() -> Self {
        Self {
            min_depth: 0.2,
            mask_depth: 5.0,
            passes: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkLayers {
    pub dem: String,
    /// One filled elevation raster per pass, in order.
    pub fill_passes: Vec<String>,
    pub fill_direction: String,
    pub depth: String,
    pub sinks: String,
    pub clumps: String,
    pub clump_max_depth: String,
    pub targets: String,
    pub mask: String,
    pub targets_vector: String,
    pub mask_vector: String,
}

impl SinkLayers {
    /// A DEM named like one of the sink layers or fill passes gets a `_dem`
    /// suffix.
    pub fn new(dem: impl Into<String>, passes: u32) -> Self {
        let mut layers = Self {
            dem: String::new(),
            fill_passes: (0..passes).map(|i| format!("fill_pass_{i}")).collect(),
            fill_direction: "dir".into(),
            depth: "diff".into(),
            sinks: "sinks".into(),
            clumps: "sink_clump".into(),
            clump_max_depth: "sink_max".into(),
            targets: "sink_target".into(),
            mask: "sink_mask".into(),
            targets_vector: "sinks_vec".into(),
            mask_vector: "sinks_mask_vec".into(),
        };
        let dem = distinct_layer(dem.into(), &layers.intermediates(), "_dem");
        layers.dem = dem;
        layers
    }

    fn intermediates(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fill_passes.iter().map(String::as_str).collect();
        names.extend([
            self.fill_direction.as_str(),
            self.depth.as_str(),
            self.sinks.as_str(),
            self.clumps.as_str(),
            self.clump_max_depth.as_str(),
            self.targets.as_str(),
            self.mask.as_str(),
            self.targets_vector.as_str(),
            self.mask_vector.as_str(),
        ]);
        names
    }

    /// Output of the final fill pass.
    pub fn filled(&self) -> &str {
        self.fill_passes.last().map(String::as_str).unwrap_or(&self.dem)
    }
}

/// Closed depressions worth breaching, plus a mask of very deep ones
/// (usually quarries).
#[derive(Clone, Debug)]
pub struct Sinks {
    input: PathBuf,
    params: SinkParams,
    layers: SinkLayers,
}

impl Sinks {
    pub fn new(input: impl Into<PathBuf>, params: SinkParams) -> Result<Self, GrassError> {
        let input = input.into();
        if params.passes == 0 {
            return Err(GrassError::InvalidParameter(
                "passes must be at least 1".into(),
            ));
        }
        if !params.min_depth.is_finite() || !params.mask_depth.is_finite() {
            return Err(GrassError::InvalidParameter(
                "depth thresholds must be finite numbers".into(),
            ));
        }
        let layers = SinkLayers::new(layer_name(&input)?, params.passes);
        Ok(Self {
            input,
            params,
            layers,
        })
    }

    pub fn layers(&self) -> &SinkLayers {
        &self.layers
    }
}

impl Pipeline for Sinks {
    fn name(&self) -> &'static str {
        "sinks"
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

        // Filling is slow when sinks are numerous and may leave some unfilled.
        let mut previous = &l.dem;
        for (pass, output) in l.fill_passes.iter().enumerate() {
            plan.announce(
                format!("Executing fill pass {pass}"),
                Invocation::new("r.fill.dir")
                    .param("input", previous)
                    .param("output", output)
                    .param("direction", &l.fill_direction)
                    .overwrite(),
            );
            previous = output;
        }

        plan.announce(
            "Identifying sinks",
            Invocation::mapcalc(format!("{} = {} - {}", l.depth, l.filled(), l.dem)),
        );
        plan.push(Invocation::mapcalc(format!(
            "{} = if({} > 0.0, 1, null())",
            l.sinks, l.depth
        )));
        plan.push(
            Invocation::new("r.clump")
                .flags("d")
                .param("input", &l.sinks)
                .param("output", &l.clumps)
                .overwrite(),
        );
        // Each clump carries its deepest cell.
        plan.push(
            Invocation::new("r.stats.zonal")
                .param("base", &l.clumps)
                .param("cover", &l.depth)
                .param("method", "max")
                .param("output", &l.clump_max_depth)
                .overwrite(),
        );
        plan.push(Invocation::mapcalc(format!(
            "{} = if({} > {}, {}, null())",
            l.targets, l.clump_max_depth, self.params.min_depth, l.clumps
        )));
        plan.push(Invocation::mapcalc(format!(
            "{} = if({} > {}, {}, null())",
            l.mask, l.clump_max_depth, self.params.mask_depth, l.clumps
        )));

        plan.announce(
            "Converting to vector",
            steps::to_vector(&l.targets, &l.targets_vector, Geometry::Area),
        );
        plan.push(steps::to_vector(&l.mask, &l.mask_vector, Geometry::Area));

        plan.section("Exporting");
        for (layer, file) in [
            (&l.targets_vector, "sinks.shp"),
            (&l.mask_vector, "sinks_mask.shp"),
        ] {
            let output = dst.join(file);
            plan.export(steps::export_shapefile(layer, &output, Geometry::Area), output);
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expressions(plan: &Plan) -> Vec<String> {
        plan.invocations()
            .filter(|inv| inv.module() == "r.mapcalc")
            .filter_map(|inv| inv.get("expression").map(str::to_string))
            .collect()
    }

    #[test]
    fn single_pass_fills_from_dem() {
        let plan = Sinks::new("/data/dem.tif", SinkParams::default())
            .unwrap()
            .plan(Path::new("/out"));
        let fills: Vec<_> = plan
            .invocations()
            .filter(|inv| inv.module() == "r.fill.dir")
            .collect();

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].get("input"), Some("dem"));
        assert_eq!(fills[0].get("output"), Some("fill_pass_0"));
        assert_eq!(fills[0].get("direction"), Some("dir"));
        assert_eq!(expressions(&plan)[0], "diff = fill_pass_0 - dem");
    }

    #[test]
    fn passes_chain_through_previous_output() {
        let params = SinkParams {
            passes: 3,
            ..SinkParams::default()
        };
        let plan = Sinks::new("/data/dem.tif", params)
            .unwrap()
            .plan(Path::new("/out"));
        let chain: Vec<_> = plan
            .invocations()
            .filter(|inv| inv.module() == "r.fill.dir")
            .map(|inv| (inv.get("input").unwrap(), inv.get("output").unwrap()))
            .collect();

        assert_eq!(
            chain,
            vec![
                ("dem", "fill_pass_0"),
                ("fill_pass_0", "fill_pass_1"),
                ("fill_pass_1", "fill_pass_2"),
            ]
        );
        assert_eq!(expressions(&plan)[0], "diff = fill_pass_2 - dem");
    }

    #[test]
    fn depth_thresholds_select_targets_and_mask() {
        let params = SinkParams {
            min_depth: 0.5,
            mask_depth: 12.0,
            passes: 1,
        };
        let plan = Sinks::new("/data/dem.tif", params)
            .unwrap()
            .plan(Path::new("/out"));

        assert_eq!(
            expressions(&plan),
            vec![
                "diff = fill_pass_0 - dem",
                "sinks = if(diff > 0.0, 1, null())",
                "sink_target = if(sink_max > 0.5, sink_clump, null())",
                "sink_mask = if(sink_max > 12, sink_clump, null())",
            ]
        );
        let zonal = plan
            .invocations()
            .find(|inv| inv.module() == "r.stats.zonal")
            .unwrap();
        assert_eq!(zonal.get("method"), Some("max"));
        assert_eq!(zonal.get("cover"), Some("diff"));
        assert_eq!(
            plan.outputs(),
            [PathBuf::from("/out/sinks.shp"), PathBuf::from("/out/sinks_mask.shp")]
        );
    }

    #[test]
    fn zero_passes_is_rejected() {
        let params = SinkParams {
            passes: 0,
            ..SinkParams::default()
        };
        let err = Sinks::new("/data/dem.tif", params).unwrap_err();
        assert!(matches!(err, GrassError::InvalidParameter(_)));
    }

    #[test]
    fn dem_named_like_a_sink_layer_keeps_its_data() {
        let sinks = Sinks::new("/data/diff.tif", SinkParams::default()).unwrap();
        assert_eq!(sinks.layers().dem, "diff_dem");

        let plan = sinks.plan(Path::new("/out"));
        let fill = plan.invocations().nth(1).unwrap();
        assert_eq!(fill.get("input"), Some("diff_dem"));
        assert!(expressions(&plan).contains(&"diff = fill_pass_0 - diff_dem".to_string()));

        let fill_named = Sinks::new("/data/fill_pass_0.tif", SinkParams::default()).unwrap();
        assert_eq!(fill_named.layers().dem, "fill_pass_0_dem");
    }
}
