//! Focus and zoom geometry for ballot images.
//!
//! Two views of the same ballot image: zoomed out shows the whole ballot,
//! zoomed in centers the write-in area in the viewport and scales it up so
//! that it spans the width the whole ballot would otherwise take. Only the
//! geometry is computed here. Drawing is left to the caller.

use std::str::FromStr;

use serde::Serialize;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomLevel {
    ZoomedIn,
    ZoomedOut,
}

impl ZoomLevel {
    pub fn can_zoom_in(&self) -> bool {
        *self == ZoomLevel::ZoomedOut
    }

    pub fn can_zoom_out(&self) -> bool {
        *self == ZoomLevel::ZoomedIn
    }

    pub fn zoom_in(self) -> ZoomLevel {
        ZoomLevel::ZoomedIn
    }

    pub fn zoom_out(self) -> ZoomLevel {
        ZoomLevel::ZoomedOut
    }
}

/// Every new write-in is first shown zoomed in.
impl Default for ZoomLevel {
    fn default() -> Self {
        ZoomLevel::ZoomedIn
    }
}

impl FromStr for ZoomLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" | "zoomed-in" => Ok(ZoomLevel::ZoomedIn),
            "out" | "zoomed-out" => Ok(ZoomLevel::ZoomedOut),
            x => Err(format!("unknown zoom level {:?}, expected 'in' or 'out'", x)),
        }
    }
}

/// How to place the ballot image in the viewport.
///
/// The image is drawn at `scale`, with its top left corner at
/// (`offset_x`, `offset_y`) in viewport coordinates.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct FocusTransform {
    #[serde(rename = "zoomLevel")]
    pub zoom_level: ZoomLevel,
    pub scale: f64,
    #[serde(rename = "offsetX")]
    pub offset_x: f64,
    #[serde(rename = "offsetY")]
    pub offset_y: f64,
    /// Size of the scaled ballot.
    #[serde(rename = "displayWidth")]
    pub display_width: f64,
    #[serde(rename = "displayHeight")]
    pub display_height: f64,
    /// The write-in area in viewport coordinates, only when zoomed in. The
    /// rest of the viewport gets dimmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Rect>,
}

fn zoomed_out(view: &ImageView, image_scale: f64) -> FocusTransform {
    FocusTransform {
        zoom_level: ZoomLevel::ZoomedOut,
        scale: image_scale,
        offset_x: 0.0,
        offset_y: 0.0,
        display_width: view.ballot_bounds.width * image_scale,
        display_height: view.ballot_bounds.height * image_scale,
        overlay: None,
    }
}

/// Computes the placement of the ballot image for a zoom level.
///
/// A write-in area without a positive width cannot be zoomed on. The
/// zoomed out placement is returned instead.
pub fn focus_transform(
    view: &ImageView,
    zoom_level: ZoomLevel,
    viewport: &Viewport,
    image_scale: f64,
) -> FocusTransform {
    let ballot = &view.ballot_bounds;
    let write_in = &view.write_in_bounds;
    if zoom_level == ZoomLevel::ZoomedOut || write_in.width <= 0.0 {
        return zoomed_out(view, image_scale);
    }
    let scale = (ballot.width / write_in.width) * image_scale;
    let viewport_center_x = viewport.width / 2.0;
    let viewport_center_y = viewport.height / 2.0;
    let cutout_width = write_in.width * scale;
    let cutout_height = write_in.height * scale;
    FocusTransform {
        zoom_level,
        scale,
        offset_x: viewport_center_x - write_in.center_x() * scale,
        offset_y: viewport_center_y - write_in.center_y() * scale,
        display_width: ballot.width * scale,
        display_height: ballot.height * scale,
        overlay: Some(Rect::new(
            viewport_center_x - cutout_width / 2.0,
            viewport_center_y - cutout_height / 2.0,
            cutout_width,
            cutout_height,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    fn view(write_in_bounds: Rect) -> ImageView {
        ImageView {
            write_in_id: "win0".to_string(),
            cvr_id: "cvr-a".to_string(),
            image: "cvr-a-front.jpg".to_string(),
            ballot_bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
            contest_bounds: Rect::new(0.0, 0.0, 100.0, 50.0),
            write_in_bounds,
        }
    }

    const VIEWPORT: Viewport = Viewport {
        width: 1200.0,
        height: 800.0,
    };

    #[test]
    fn zoomed_in_math() {
        let v = view(Rect::new(40.0, 20.0, 60.0, 20.0));
        let t = focus_transform(&v, ZoomLevel::ZoomedIn, &VIEWPORT, 0.5);
        assert!(close(t.scale, 0.8333), "{:?}", t);
        assert!(close(t.display_width, 83.33), "{:?}", t);
        // The write-in center (70, 30) lands on the viewport center.
        assert!(close(t.offset_x + 70.0 * t.scale, 600.0));
        assert!(close(t.offset_y + 30.0 * t.scale, 400.0));
        let overlay = t.overlay.unwrap();
        assert!(close(overlay.width, 50.0));
        assert!(close(overlay.height, 16.67));
        assert!(close(overlay.center_x(), 600.0));
        assert!(close(overlay.center_y(), 400.0));
    }

    #[test]
    fn zoomed_out_math() {
        let v = view(Rect::new(40.0, 20.0, 60.0, 20.0));
        let t = focus_transform(&v, ZoomLevel::ZoomedOut, &VIEWPORT, 0.5);
        assert_eq!(t.scale, 0.5);
        assert_eq!(t.display_width, 50.0);
        assert_eq!((t.offset_x, t.offset_y), (0.0, 0.0));
        assert_eq!(t.overlay, None);
    }

    #[test]
    fn degenerate_write_in_bounds() {
        let v = view(Rect::new(40.0, 20.0, 0.0, 20.0));
        let t = focus_transform(&v, ZoomLevel::ZoomedIn, &VIEWPORT, 0.5);
        assert_eq!(t, focus_transform(&v, ZoomLevel::ZoomedOut, &VIEWPORT, 0.5));
        assert!(t.scale.is_finite());
    }

    #[test]
    fn zoom_controls() {
        let level = ZoomLevel::default();
        assert_eq!(level, ZoomLevel::ZoomedIn);
        assert!(!level.can_zoom_in());
        assert!(level.can_zoom_out());
        let level = level.zoom_out();
        assert!(level.can_zoom_in());
        assert!(!level.can_zoom_out());
        assert_eq!(level.zoom_in(), ZoomLevel::ZoomedIn);
        assert_eq!("out".parse::<ZoomLevel>(), Ok(ZoomLevel::ZoomedOut));
        assert!("sideways".parse::<ZoomLevel>().is_err());
    }
}
