use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use printpdf::image_crate::{self, DynamicImage, GenericImageView};
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument};
use thiserror::Error;

const PAGE_WIDTH_PT: f32 = 612.0;
const PAGE_HEIGHT_PT: f32 = 792.0;
const MARGIN_PT: f32 = 50.0;
const IMAGE_DPI: f32 = 300.0;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to generate PDF: {0}")]
    Render(#[from] printpdf::Error),
}

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// Accepts either raw base64 or a `data:<mime>;base64,<payload>` URL.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };
    general_purpose::STANDARD.decode(data.trim())
}

/// Renders a single US-Letter page with `title`, a generation timestamp and the
/// chart image scaled into the remaining space. An image that cannot be decoded
/// is replaced by an error line instead of failing the document.
pub fn render_chart_pdf(image_bytes: &[u8], title: &str) -> Result<Vec<u8>, PdfError> {
    let (doc, page, layer) = PdfDocument::new(
        title,
        mm(PAGE_WIDTH_PT),
        mm(PAGE_HEIGHT_PT),
        "Chart",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;

    layer.use_text(title, 16.0, mm(MARGIN_PT), mm(PAGE_HEIGHT_PT - 50.0), &bold);

    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
    layer.use_text(
        format!("Generated: {}", timestamp),
        10.0,
        mm(MARGIN_PT),
        mm(PAGE_HEIGHT_PT - 70.0),
        &regular,
    );

    match image_crate::load_from_memory(image_bytes) {
        Ok(decoded) => {
            let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
            let (width_px, height_px) = (rgb.width().max(1) as f32, rgb.height().max(1) as f32);

            // Box: (50, 50) to (page - 50, page - 150), aspect ratio preserved.
            let box_w = PAGE_WIDTH_PT - 2.0 * MARGIN_PT;
            let box_h = PAGE_HEIGHT_PT - 4.0 * MARGIN_PT;
            let natural_w = width_px / IMAGE_DPI * 72.0;
            let natural_h = height_px / IMAGE_DPI * 72.0;
            let scale = (box_w / natural_w).min(box_h / natural_h);

            Image::from_dynamic_image(&rgb).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(mm(MARGIN_PT)),
                    translate_y: Some(mm(MARGIN_PT)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(IMAGE_DPI),
                    ..Default::default()
                },
            );
        }
        Err(e) => {
            tracing::warn!("PDF | image decode failed | title={} | err={}", title, e);
            layer.use_text(
                format!("Error rendering image: {}", e),
                10.0,
                mm(MARGIN_PT),
                mm(PAGE_HEIGHT_PT - 100.0),
                &regular,
            );
        }
    }

    Ok(doc.save_to_bytes()?)
}

/// `Content-Disposition` file name for a chart title.
pub fn attachment_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '"' | '\\' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}.pdf", stem)
}
