//! Invocation templates shared by several pipelines.

use std::fmt;
use std::path::Path;

use crate::invocation::Invocation;

/// Creation options for exported GeoTIFFs: world file plus LZW compression.
pub const GTIFF_CREATE_OPTIONS: &str = "TFW=YES,COMPRESS=LZW";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Geometry {
    Point,
    Line,
    Area,
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Geometry::Point => "point",
            Geometry::Line => "line",
            Geometry::Area => "area",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellType {
    Int16,
    Float32,
    Float64,
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CellType::Int16 => "Int16",
            CellType::Float32 => "Float32",
            CellType::Float64 => "Float64",
        })
    }
}

pub fn import_raster(input: &Path, layer: &str) -> Invocation {
    Invocation::new("r.in.gdal")
        .param("input", input.display())
        .param("output", layer)
        .overwrite()
}

pub fn import_vector(input: &Path, layer: &str) -> Invocation {
    Invocation::new("v.in.ogr")
        .param("input", input.display())
        .param("output", layer)
        .overwrite()
}

pub fn to_vector(input: &str, output: &str, geometry: Geometry) -> Invocation {
    Invocation::new("r.to.vect")
        .param("input", input)
        .param("output", output)
        .param("type", geometry)
        .overwrite()
}

pub fn strahler_order(streams: &str, direction: &str, strahler: &str) -> Invocation {
    Invocation::new("r.stream.order")
        .param("stream_rast", streams)
        .param("direction", direction)
        .param("strahler", strahler)
        .overwrite()
}

/// Elevation difference to the downstream stream cell (height above nearest
/// drainage).
pub fn height_above_stream(
    streams: &str,
    direction: &str,
    elevation: &str,
    difference: &str,
) -> Invocation {
    Invocation::new("r.stream.distance")
        .param("stream_rast", streams)
        .param("direction", direction)
        .param("elevation", elevation)
        .param("method", "downstream")
        .param("difference", difference)
        .overwrite()
}

/// GeoTIFF export; `create_options` adds a world file and compression.
pub fn export_geotiff(
    layer: &str,
    cell_type: CellType,
    output: &Path,
    create_options: bool,
) -> Invocation {
    let invocation = Invocation::new("r.out.gdal")
        .param("input", layer)
        .param("type", cell_type)
        .param("output", output.display())
        .param("format", "GTiff");
    let invocation = if create_options {
        invocation.param("createopt", GTIFF_CREATE_OPTIONS)
    } else {
        invocation
    };
    invocation.overwrite()
}

pub fn export_shapefile(layer: &str, output: &Path, geometry: Geometry) -> Invocation {
    Invocation::new("v.out.ogr")
        .param("input", layer)
        .param("output", output.display())
        .param("format", "ESRI_Shapefile")
        .param("type", geometry)
        .overwrite()
}
