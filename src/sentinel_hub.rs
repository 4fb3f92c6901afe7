mod catalog;
mod process;
pub use catalog::CatalogClient;
pub use process::{process_request, ImageClient};

pub const IMAGE_CONTENT_TYPE: &str = "image/tiff";

/// WGS84 with longitude first, which is the axis order of `BoundingBox::to_array`.
pub const CRS84: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";

pub const OUTPUT_SIZE: u32 = 512;

/// Composites B04, B03, B02 (true colour) and B08 (NIR) into a four band raster.
pub const EVALSCRIPT: &str = r#"
//VERSION=3
function setup() {
  return {
    input: ["B02", "B03", "B04", "B08"],
    output: { bands: 4 },
  }
}

function evaluatePixel(sample) {
  return [sample.B04, sample.B03, sample.B02, sample.B08]
}
"#;
