// Responsive position resolution.
// One canonical (desktop) rectangle drives all breakpoints through fixed scale factors.

use crate::error::GeometryError;
use crate::types::*;

/// Maps canonical rectangles to per-breakpoint rectangles and percent points to pixels.
#[derive(Debug, Clone, Default)]
pub struct GeometryResolver {
    scale: BreakpointScale,
}

impl GeometryResolver {
    pub fn new(scale: BreakpointScale) -> Result<Self, GeometryError> {
        scale.validate()?;
        Ok(GeometryResolver { scale })
    }

    pub fn scale(&self) -> &BreakpointScale {
        &self.scale
    }

    /// Scale every component of `canonical` by the breakpoint's factor.
    pub fn scale_down(&self, canonical: &Rect, breakpoint: Breakpoint) -> Result<Rect, GeometryError> {
        let factor = self.scale.factor(breakpoint);
        Rect::new(
            canonical.x() * factor,
            canonical.y() * factor,
            canonical.width() * factor,
            canonical.height() * factor,
        )
    }

    /// All three breakpoints from one canonical rectangle, treated as desktop.
    pub fn to_responsive(&self, canonical: &Rect) -> Result<ResponsivePosition, GeometryError> {
        Ok(ResponsivePosition::from_parts(
            self.scale_down(canonical, Breakpoint::Desktop)?,
            self.scale_down(canonical, Breakpoint::Tablet)?,
            self.scale_down(canonical, Breakpoint::Mobile)?,
        ))
    }

    /// Apply a drag/resize made on one breakpoint. The other two are recomputed from
    /// the edited rectangle, not from the previous desktop value.
    pub fn resize(
        &self,
        breakpoint: Breakpoint,
        edited: &Rect,
    ) -> Result<ResponsivePosition, GeometryError> {
        let factor = self.scale.factor(breakpoint);
        let desktop = Rect::new(
            edited.x() / factor,
            edited.y() / factor,
            edited.width() / factor,
            edited.height() / factor,
        )?;
        let mut position = self.to_responsive(&desktop)?;
        // Keep the edited breakpoint exactly as the user left it.
        position = match breakpoint {
            Breakpoint::Desktop => ResponsivePosition::from_parts(*edited, *position.tablet(), *position.mobile()),
            Breakpoint::Tablet => ResponsivePosition::from_parts(*position.desktop(), *edited, *position.mobile()),
            Breakpoint::Mobile => ResponsivePosition::from_parts(*position.desktop(), *position.tablet(), *edited),
        };
        Ok(position)
    }

    /// Marker rectangle of `marker_size` centred on a percent point, shifted to stay
    /// inside the canvas. `Ok(None)` while the natural size is unknown.
    pub fn marker_rect(
        &self,
        point: PercentPoint,
        natural: Option<Dimensions>,
        marker_size: f64,
    ) -> Result<Option<Rect>, GeometryError> {
        let (Some(center), Some(canvas)) = (percent_to_pixel(point, natural), natural) else {
            return Ok(None);
        };
        let half = marker_size / 2.0;
        let x = (center.x - half).min(canvas.width - marker_size).max(0.0);
        let y = (center.y - half).min(canvas.height - marker_size).max(0.0);
        Rect::new(x, y, marker_size, marker_size).map(Some)
    }
}

/// True iff `rect` lies fully inside a `container_width` x `container_height` container.
pub fn validate_bounds(rect: &Rect, container_width: f64, container_height: f64) -> bool {
    const EPSILON: f64 = 1e-9;
    rect.x() >= 0.0
        && rect.y() >= 0.0
        && rect.right() <= container_width + EPSILON
        && rect.bottom() <= container_height + EPSILON
}

/// Percent point to canvas pixels. `None` when the natural size is unknown or unusable;
/// callers must defer positioning rather than guess a size.
pub fn percent_to_pixel(percent: PercentPoint, natural: Option<Dimensions>) -> Option<PixelPoint> {
    let natural = natural.filter(Dimensions::is_usable)?;
    Some(PixelPoint::new(
        percent.x / 100.0 * natural.width,
        percent.y / 100.0 * natural.height,
    ))
}

/// Inverse of [`percent_to_pixel`].
pub fn pixel_to_percent(pixel: PixelPoint, natural: Option<Dimensions>) -> Option<PercentPoint> {
    let natural = natural.filter(Dimensions::is_usable)?;
    Some(PercentPoint::new(
        pixel.x / natural.width * 100.0,
        pixel.y / natural.height * 100.0,
    ))
}
