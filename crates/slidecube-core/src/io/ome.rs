//! Hand-assembled OME metadata document embedded into every pyramidal
//! output. The TiffData back-reference must point at the output's own
//! filename, so the document is assembled here rather than delegated to a
//! generic metadata writer.

use uuid::Uuid;

/// Everything the metadata document needs to describe one output image.
#[derive(Clone, Debug)]
pub struct OmeImageSpec<'a> {
    /// Image display name (the output filename without extension).
    pub name: &'a str,
    /// Output filename with extension, referenced by the TiffData block.
    pub file_name: &'a str,
    pub size_x: usize,
    pub size_y: usize,
    pub size_c: usize,
    pub size_z: usize,
    pub size_t: usize,
    pub dimension_order: &'a str,
    pub physical_pixel_size: f64,
}

const OME_NS: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";

/// RGB channel descriptors in OME signed-integer colour encoding.
const RGB_CHANNELS: [(&str, &str); 3] =
    [("R", "-16777216"), ("G", "16711680"), ("B", "65280")];

pub fn ome_xml(spec: &OmeImageSpec<'_>) -> String {
    let ome_uuid = Uuid::new_v4();
    let tiff_uuid = Uuid::new_v4();

    let mut channels = String::new();
    if spec.size_c == 3 {
        for (i, (name, color)) in RGB_CHANNELS.iter().enumerate() {
            channels.push_str(&format!(
                "<Channel ID=\"Channel:0:{i}\" Name=\"{name}\" Color=\"{color}\" \
                 SamplesPerPixel=\"1\"/>"
            ));
        }
    } else {
        for i in 0..spec.size_c {
            channels.push_str(&format!(
                "<Channel ID=\"Channel:0:{i}\" SamplesPerPixel=\"1\"/>"
            ));
        }
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <OME xmlns=\"{OME_NS}\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         UUID=\"urn:uuid:{ome_uuid}\" \
         xsi:schemaLocation=\"{OME_NS} {OME_NS}/ome.xsd\">\
         <Image ID=\"Image:0\" Name=\"{name}\">\
         <Pixels ID=\"Pixels:0\" DimensionOrder=\"{order}\" Type=\"uint8\" \
         SizeX=\"{x}\" SizeY=\"{y}\" SizeC=\"{c}\" SizeZ=\"{z}\" SizeT=\"{t}\" \
         PhysicalSizeX=\"{px}\" PhysicalSizeY=\"{px}\" PhysicalSizeZ=\"1\">\
         {channels}\
         <TiffData FirstC=\"0\" FirstT=\"0\" FirstZ=\"0\" PlaneCount=\"1\">\
         <UUID FileName=\"{file}\">urn:uuid:{tiff_uuid}</UUID>\
         </TiffData>\
         </Pixels>\
         </Image>\
         </OME>",
        name = xml_escape(spec.name),
        order = spec.dimension_order,
        x = spec.size_x,
        y = spec.size_y,
        c = spec.size_c,
        z = spec.size_z,
        t = spec.size_t,
        px = spec.physical_pixel_size,
        file = xml_escape(spec.file_name),
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
