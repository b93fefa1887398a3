//! PDF serialisation with `lopdf`.
//!
//! Builds the document object by object: one shared font pair, one image
//! XObject per embedded image (with a soft mask when the image has alpha),
//! an axial shading for the page background, and a content stream per page.
//! Helvetica and Helvetica-Bold are standard fonts, so nothing is embedded
//! and text is written as WinAnsi bytes.

use crate::config::{PageGeometry, ReportStyle, Rgb};
use crate::error::PlantReportError;
use crate::pipeline::fonts::{encode_win_ansi, FontFace, ASCENT};
use crate::pipeline::layout::{DrawOp, FlowedDocument, FlowedPage};
use crate::pipeline::render::{DocumentBackend, DocumentInfo};
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// Writes flowed documents as PDF 1.5.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfBackend {
    /// Top and bottom colours of decorated pages' background.
    background: Option<(Rgb, Rgb)>,
}

impl PdfBackend {
    pub fn new(style: &ReportStyle) -> Self {
        Self {
            background: Some((style.gradient_top, style.gradient_bottom)),
        }
    }

    /// No background on any page.
    pub fn plain() -> Self {
        Self { background: None }
    }
}

impl Default for PdfBackend {
    fn default() -> Self {
        Self::new(&ReportStyle::default())
    }
}

impl DocumentBackend for PdfBackend {
    fn write(
        &self,
        flowed: &FlowedDocument<'_>,
        info: &DocumentInfo,
    ) -> Result<Vec<u8>, PlantReportError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let geometry = flowed.geometry;

        let mut fonts = Dictionary::new();
        for face in [FontFace::Regular, FontFace::Bold] {
            let id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(face.resource_name(), id);
        }

        let mut xobjects = Dictionary::new();
        for (index, image) in flowed.images.iter().enumerate() {
            let id = add_image(&mut doc, image);
            xobjects.set(image_name(index), id);
        }

        let shading = self
            .background
            .map(|(top, bottom)| add_gradient(&mut doc, &geometry, top, bottom));

        let mut kids = Vec::with_capacity(flowed.pages.len());
        for page in &flowed.pages {
            let background = if page.decorated { shading } else { None };
            let content = page_content(page, &geometry, background.is_some());
            let encoded = content
                .encode()
                .map_err(|e| PlantReportError::RenderFailure {
                    detail: format!("content stream: {e}"),
                })?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let mut resources = dictionary! {
                "Font" => fonts.clone(),
                "XObject" => xobjects.clone(),
            };
            if let Some(shading_id) = background {
                resources.set("Shading", dictionary! { "Sh0" => shading_id });
            }

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    geometry.width.into(),
                    geometry.height.into(),
                ],
                "Contents" => content_id,
                "Resources" => resources,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(encode_win_ansi(&info.title)),
            "Producer" => Object::string_literal(info.producer.as_str()),
            "CreationDate" => Object::string_literal(
                info.created.format("D:%Y%m%d%H%M%SZ").to_string()
            ),
        });
        doc.trailer.set("Info", info_id);

        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| PlantReportError::RenderFailure {
                detail: format!("serialise PDF: {e}"),
            })?;
        debug!("Wrote {} page PDF ({} bytes)", count, out.len());
        Ok(out)
    }
}

fn image_name(index: usize) -> String {
    format!("Im{}", index)
}

/// Add an image XObject (8-bit RGB, plus a grey soft mask for alpha).
fn add_image(doc: &mut Document, image: &DynamicImage) -> ObjectId {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if image.color().has_alpha() {
        let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p[3]).collect();
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        dict.set("SMask", mask_id);
    }

    doc.add_object(Stream::new(dict, image.to_rgb8().into_raw()))
}

/// Add a vertical axial shading from `top` to `bottom` across the page.
fn add_gradient(doc: &mut Document, geometry: &PageGeometry, top: Rgb, bottom: Rgb) -> ObjectId {
    let colour = |c: Rgb| -> Vec<Object> { c.unit().iter().map(|&v| v.into()).collect() };
    let function_id = doc.add_object(dictionary! {
        "FunctionType" => 2,
        "Domain" => vec![0.into(), 1.into()],
        "C0" => colour(top),
        "C1" => colour(bottom),
        "N" => 1,
    });
    doc.add_object(dictionary! {
        "ShadingType" => 2,
        "ColorSpace" => "DeviceRGB",
        "Coords" => vec![0.into(), geometry.height.into(), 0.into(), 0.into()],
        "Function" => function_id,
        "Extend" => vec![true.into(), true.into()],
    })
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn fill_colour(c: Rgb) -> Operation {
    let [r, g, b] = c.unit();
    op("rg", vec![r.into(), g.into(), b.into()])
}

/// Build one page's content stream, converting top-left coordinates to
/// PDF's bottom-left space.
fn page_content(page: &FlowedPage, geometry: &PageGeometry, background: bool) -> Content {
    let h = geometry.height;
    let mut ops = Vec::new();

    if background {
        ops.extend([
            op("q", vec![]),
            op(
                "re",
                vec![0.into(), 0.into(), geometry.width.into(), h.into()],
            ),
            op("W", vec![]),
            op("n", vec![]),
            op("sh", vec!["Sh0".into()]),
            op("Q", vec![]),
        ]);
    }

    for draw in &page.ops {
        match draw {
            DrawOp::Text {
                x,
                top,
                text,
                face,
                size,
                color,
                word_spacing,
            } => {
                let baseline = h - top - ASCENT * size;
                ops.extend([
                    op("BT", vec![]),
                    fill_colour(*color),
                    op("Tf", vec![face.resource_name().into(), (*size).into()]),
                    op("Tw", vec![(*word_spacing).into()]),
                    op("Td", vec![(*x).into(), baseline.into()]),
                    op("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
                    op("ET", vec![]),
                ]);
            }
            DrawOp::Rule {
                x,
                top,
                width,
                thickness,
                color,
            } => {
                ops.extend([
                    fill_colour(*color),
                    op(
                        "re",
                        vec![
                            (*x).into(),
                            (h - top - thickness).into(),
                            (*width).into(),
                            (*thickness).into(),
                        ],
                    ),
                    op("f", vec![]),
                ]);
            }
            DrawOp::Image {
                index,
                x,
                top,
                width,
                height,
            } => {
                ops.extend([
                    op("q", vec![]),
                    op(
                        "cm",
                        vec![
                            (*width).into(),
                            0.into(),
                            0.into(),
                            (*height).into(),
                            (*x).into(),
                            (h - top - height).into(),
                        ],
                    ),
                    op("Do", vec![image_name(*index).into()]),
                    op("Q", vec![]),
                ]);
            }
        }
    }

    Content { operations: ops }
}
