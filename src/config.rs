use serde::{Deserialize, Serialize};

/// Canvas size: physical dimensions at a print resolution, or raw pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasSize {
    /// Physical dimensions in `unit`, rasterized at `dpi`.
    Physical {
        width: f64,
        height: f64,
        unit: SizeUnit,
        dpi: u32,
    },
    /// Exact pixel dimensions.
    Pixels { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    Inches,
    Centimeters,
    Millimeters,
}

impl CanvasSize {
    /// Wire fields for this canvas, shared by collage creation and the
    /// grid-optimize request.
    pub fn to_form_fields(&self) -> Vec<(&'static str, String)> {
        match *self {
            CanvasSize::Physical {
                width,
                height,
                unit,
                dpi,
            } => vec![
                ("canvas_width", width.to_string()),
                ("canvas_height", height.to_string()),
                ("size_unit", unit.as_str().to_string()),
                ("dpi", dpi.to_string()),
            ],
            CanvasSize::Pixels { width, height } => vec![
                ("pixel_width", width.to_string()),
                ("pixel_height", height.to_string()),
            ],
        }
    }
}

impl SizeUnit {
    pub fn as_str(&self) -> &str {
        match self {
            SizeUnit::Inches => "inches",
            SizeUnit::Centimeters => "centimeters",
            SizeUnit::Millimeters => "millimeters",
        }
    }
}

/// Placement algorithm applied by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStyle {
    Masonry,
    Grid,
    Random,
    Spiral,
}

impl LayoutStyle {
    pub fn as_str(&self) -> &str {
        match self {
            LayoutStyle::Masonry => "masonry",
            LayoutStyle::Grid => "grid",
            LayoutStyle::Random => "random",
            LayoutStyle::Spiral => "spiral",
        }
    }
}

/// Encoding of the rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    /// File extension for suggested download filenames.
    pub fn extension(&self) -> &str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }
}

/// Rendering parameters for one collage submission.
///
/// A plain value object constructed fresh per submission: no identity, no
/// lifecycle. Defaults match the service's own (12x18in at 300 DPI,
/// masonry, white background).
///
/// # Example
/// ```
/// use collage_client::{CollageConfig, LayoutStyle, OutputFormat};
///
/// let config = CollageConfig::new()
///     .layout(LayoutStyle::Grid)
///     .spacing(8)
///     .background("#1A1A2EFF")
///     .output_format(OutputFormat::Png);
///
/// assert_eq!(config.layout, LayoutStyle::Grid);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CollageConfig {
    pub canvas: CanvasSize,
    pub layout: LayoutStyle,
    /// Inter-image spacing in pixels.
    pub spacing: u32,
    /// Opaque `#RRGGBB` or alpha `#RRGGBBAA` hex.
    pub background: String,
    pub preserve_aspect: bool,
    pub shadows: bool,
    /// `None` lets the backend pick its default encoding.
    pub output_format: Option<OutputFormat>,
}

impl CollageConfig {
    pub fn new() -> Self {
        Self {
            canvas: CanvasSize::Physical {
                width: 12.0,
                height: 18.0,
                unit: SizeUnit::Inches,
                dpi: 300,
            },
            layout: LayoutStyle::Masonry,
            spacing: 4,
            background: "#FFFFFF".to_string(),
            preserve_aspect: true,
            shadows: false,
            output_format: None,
        }
    }

    /// Set the canvas size.
    pub fn canvas(mut self, canvas: CanvasSize) -> Self {
        self.canvas = canvas;
        self
    }

    /// Set the layout style.
    pub fn layout(mut self, layout: LayoutStyle) -> Self {
        self.layout = layout;
        self
    }

    /// Set the inter-image spacing in pixels.
    pub fn spacing(mut self, spacing: u32) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the background color as `#RRGGBB` or `#RRGGBBAA` hex.
    pub fn background(mut self, color: impl Into<String>) -> Self {
        self.background = color.into();
        self
    }

    /// Toggle aspect-ratio preservation.
    pub fn preserve_aspect(mut self, on: bool) -> Self {
        self.preserve_aspect = on;
        self
    }

    /// Toggle drop shadows behind placed images.
    pub fn shadows(mut self, on: bool) -> Self {
        self.shadows = on;
        self
    }

    /// Set the output encoding.
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Check that the background color is well-formed hex.
    pub fn validate(&self) -> Result<(), String> {
        if !is_hex_color(&self.background) {
            return Err(format!(
                "Background must be #RRGGBB or #RRGGBBAA hex, got {:?}",
                self.background
            ));
        }
        Ok(())
    }

    /// Flatten the config into its wire representation.
    ///
    /// Every field is mapped by name here, deliberately: adding a config
    /// field means adding a line to this function, so the request shape is
    /// a type-checked decision rather than a side effect of struct layout.
    pub fn to_form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = self.canvas.to_form_fields();

        fields.push(("layout_style", self.layout.as_str().to_string()));
        fields.push(("spacing", self.spacing.to_string()));
        fields.push(("background_color", self.background.clone()));
        fields.push((
            "maintain_aspect_ratio",
            self.preserve_aspect.to_string(),
        ));
        fields.push(("apply_shadow", self.shadows.to_string()));

        if let Some(format) = self.output_format {
            fields.push(("output_format", format.as_str().to_string()));
        }

        fields
    }
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hex_color(s: &str) -> bool {
    let Some(hex) = s.strip_prefix('#') else {
        return false;
    };
    (hex.len() == 6 || hex.len() == 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
}
