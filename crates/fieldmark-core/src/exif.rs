//! EXIF orientation extraction for image files.
//!
//! Survey images arrive with the camera's orientation recorded in EXIF
//! rather than applied to the pixels. The normalizer reads the tag here and
//! applies the matching rotation before storing the image.
//!
//! The tag→rotation mapping is a stateless constant table; absent or
//! garbled EXIF simply means no rotation, never an error.

use std::io::Cursor;

/// Rotation to apply to image pixels, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Leave pixels as-is.
    None,
    /// Rotate 90° clockwise.
    Deg90,
    /// Rotate 180°.
    Deg180,
    /// Rotate 270° clockwise.
    Deg270,
}

/// EXIF orientation tag values and the clockwise rotation that corrects
/// each. Mirrored and unknown values are left unrotated.
const ORIENTATION_ROTATIONS: [(u32, Rotation); 3] = [
    (3, Rotation::Deg180),
    (6, Rotation::Deg90),
    (8, Rotation::Deg270),
];

/// Map an EXIF orientation tag value to the correcting rotation.
///
/// Any value outside the table, including `None` for images without
/// readable EXIF, maps to [`Rotation::None`].
pub fn rotation_for(orientation: Option<u32>) -> Rotation {
    let Some(value) = orientation else {
        return Rotation::None;
    };
    ORIENTATION_ROTATIONS
        .iter()
        .find(|(tag, _)| *tag == value)
        .map(|(_, rotation)| *rotation)
        .unwrap_or(Rotation::None)
}

/// Extract the EXIF orientation tag from raw image bytes.
///
/// Returns `None` when the file carries no EXIF container, the container is
/// damaged, or the orientation field is absent. Partial EXIF is read as far
/// as it goes.
pub fn orientation(data: &[u8]) -> Option<u32> {
    let mut reader = exif::Reader::new();
    reader.continue_on_error(true);
    let mut cursor = Cursor::new(data);

    let exif = reader
        .read_from_container(&mut cursor)
        .or_else(|e| e.distill_partial_result(|_| {}))
        .ok()?;

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}
