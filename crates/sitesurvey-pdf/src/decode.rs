//! Turning an image XObject stream into pixels.
//!
//! DCT streams are handed to the JPEG decoder as-is. Everything else is
//! decompressed by lopdf (predictors included) and the raw samples are laid
//! out according to `/ColorSpace`, `/BitsPerComponent` and `/Decode`.

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};

use sitesurvey_core::ImageEncoding;

use crate::images::resolve;

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

fn name_of(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

fn int(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_i64().ok())
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Filter names in application order.
fn filters(doc: &Document, dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) {
        Some(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| resolve(doc, f).and_then(name_of))
            .collect(),
        _ => Vec::new(),
    }
}

/// `/DecodeParms` entry belonging to the filter at `index`.
fn decode_parms<'a>(doc: &'a Document, dict: &'a Dictionary, index: usize) -> Option<&'a Dictionary> {
    let parms = dict
        .get(b"DecodeParms")
        .or_else(|_| dict.get(b"DP"))
        .ok()
        .and_then(|p| resolve(doc, p))?;
    let entry = match parms {
        Object::Array(arr) => resolve(doc, arr.get(index)?)?,
        other if index == 0 => other,
        _ => return None,
    };
    entry.as_dict().ok()
}

/// Undo the listed filters with lopdf. Only Flate and LZW are supported.
///
/// lopdf refuses to decompress image XObjects and ignores abbreviated names
/// and indirect parameters, so the filters run on a bare stream holding only
/// `/Filter` and the resolved `/DecodeParms`.
fn decompress(
    doc: &Document,
    dict: &Dictionary,
    data: &[u8],
    names: &[String],
) -> Result<Vec<u8>, String> {
    if names.is_empty() {
        return Ok(data.to_vec());
    }

    let mut filters = Vec::with_capacity(names.len());
    let mut parms = None;
    for (i, name) in names.iter().enumerate() {
        let full = match name.as_str() {
            "FlateDecode" | "Fl" => "FlateDecode",
            "LZWDecode" | "LZW" => "LZWDecode",
            other => return Err(format!("unsupported filter {other}")),
        };
        filters.push(Object::Name(full.as_bytes().to_vec()));
        parms = parms.or_else(|| decode_parms(doc, dict, i));
    }

    let mut bare = Dictionary::new();
    bare.set("Filter", Object::Array(filters));
    if let Some(parms) = parms {
        bare.set("DecodeParms", parms.clone());
    }
    Stream::new(bare, data.to_vec())
        .decompressed_content()
        .map_err(|e| format!("{} failed: {e}", names.join("+")))
}

fn stream_bytes(doc: &Document, stream: &Stream) -> Result<Vec<u8>, String> {
    let names = filters(doc, &stream.dict);
    decompress(doc, &stream.dict, &stream.content, &names)
}

fn parse_color_space(doc: &Document, obj: &Object) -> Result<ColorSpace, String> {
    let obj = resolve(doc, obj).ok_or("dangling color space reference")?;
    match obj {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(format!(
                "unsupported color space {}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Array(arr) => {
            let family = arr.first().and_then(name_of).ok_or("empty color space array")?;
            match family.as_str() {
                "CalGray" => Ok(ColorSpace::Gray),
                "CalRGB" => Ok(ColorSpace::Rgb),
                "ICCBased" => {
                    let profile = arr
                        .get(1)
                        .and_then(|p| resolve(doc, p))
                        .and_then(|p| p.as_stream().ok())
                        .ok_or("ICCBased color space without profile stream")?;
                    match int(doc, &profile.dict, b"N") {
                        Some(1) => Ok(ColorSpace::Gray),
                        Some(3) => Ok(ColorSpace::Rgb),
                        Some(4) => Ok(ColorSpace::Cmyk),
                        _ => match profile.dict.get(b"Alternate") {
                            Ok(alt) => parse_color_space(doc, alt),
                            Err(_) => Err("ICCBased profile with unknown /N".into()),
                        },
                    }
                }
                "Indexed" | "I" => {
                    let base = parse_color_space(doc, arr.get(1).ok_or("Indexed without base")?)?;
                    if matches!(base, ColorSpace::Indexed { .. }) {
                        return Err("nested Indexed color space".into());
                    }
                    let hival = arr
                        .get(2)
                        .and_then(|h| resolve(doc, h))
                        .and_then(|h| h.as_i64().ok())
                        .ok_or("Indexed without hival")?
                        .clamp(0, 255) as usize;
                    let lookup = match arr.get(3).and_then(|l| resolve(doc, l)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(s)) => stream_bytes(doc, s)?,
                        _ => return Err("Indexed without lookup table".into()),
                    };
                    Ok(ColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        lookup,
                    })
                }
                "Separation" => Ok(ColorSpace::Gray),
                "DeviceN" => match arr.get(1).and_then(|n| resolve(doc, n)) {
                    Some(Object::Array(names)) if names.len() == 1 => Ok(ColorSpace::Gray),
                    Some(Object::Array(names)) if names.len() == 3 => Ok(ColorSpace::Rgb),
                    Some(Object::Array(names)) if names.len() == 4 => Ok(ColorSpace::Cmyk),
                    _ => Err("unsupported DeviceN color space".into()),
                },
                other => Err(format!("unsupported color space {other}")),
            }
        }
        _ => Err("malformed color space".into()),
    }
}

/// Raw integer samples, one per component, rows padded to whole bytes.
fn read_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bpc: usize,
) -> Result<Vec<u16>, String> {
    let per_row = width * components;
    let stride = (per_row * bpc).div_ceil(8);
    let needed = stride * height;
    if data.len() < needed {
        return Err(format!(
            "image data too short: {} bytes, expected {}",
            data.len(),
            needed
        ));
    }

    let mut samples = Vec::with_capacity(per_row * height);
    for row in data[..needed].chunks_exact(stride) {
        match bpc {
            8 => samples.extend(row[..per_row].iter().map(|&b| u16::from(b))),
            16 => samples.extend(
                row.chunks_exact(2)
                    .take(per_row)
                    .map(|c| u16::from_be_bytes([c[0], c[1]])),
            ),
            1 | 2 | 4 => {
                let per_byte = 8 / bpc;
                let mask = (1u16 << bpc) - 1;
                for i in 0..per_row {
                    let byte = u16::from(row[i / per_byte]);
                    let shift = 8 - bpc * (i % per_byte + 1);
                    samples.push((byte >> shift) & mask);
                }
            }
            other => return Err(format!("unsupported bits per component: {other}")),
        }
    }
    Ok(samples)
}

/// Palette entry used when the lookup table is shorter than hival.
static NO_ENTRY: [u8; 4] = [0; 4];

/// Scale a sample of `bpc` bits to 0..=255.
fn to_u8(sample: u16, bpc: usize) -> u8 {
    match bpc {
        8 => sample as u8,
        16 => (sample >> 8) as u8,
        _ => (u32::from(sample) * 255 / ((1u32 << bpc) - 1)) as u8,
    }
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - u16::from(k);
    [
        ((255 - u16::from(c)) * k / 255) as u8,
        ((255 - u16::from(m)) * k / 255) as u8,
        ((255 - u16::from(y)) * k / 255) as u8,
    ]
}

/// True when `/Decode` maps the first component as [1 0].
fn inverted(doc: &Document, dict: &Dictionary) -> bool {
    let Some(Object::Array(range)) = dict.get(b"Decode").ok().and_then(|d| resolve(doc, d)) else {
        return false;
    };
    matches!(
        (range.first().and_then(number), range.get(1).and_then(number)),
        (Some(lo), Some(hi)) if lo > hi
    )
}

fn raw_image(
    samples: Vec<u16>,
    width: u32,
    height: u32,
    space: &ColorSpace,
    bpc: usize,
) -> Result<DynamicImage, String> {
    let buffer_err = || "pixel buffer does not match image size".to_string();

    let image = match space {
        ColorSpace::Gray if bpc == 16 => DynamicImage::ImageLuma16(
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, samples).ok_or_else(buffer_err)?,
        ),
        ColorSpace::Gray => {
            let data = samples.iter().map(|&s| to_u8(s, bpc)).collect();
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, data).ok_or_else(buffer_err)?)
        }
        ColorSpace::Rgb if bpc == 16 => DynamicImage::ImageRgb16(
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, samples).ok_or_else(buffer_err)?,
        ),
        ColorSpace::Rgb => {
            let data = samples.iter().map(|&s| to_u8(s, bpc)).collect();
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, data).ok_or_else(buffer_err)?)
        }
        ColorSpace::Cmyk => {
            let data = samples
                .chunks_exact(4)
                .flat_map(|px| {
                    cmyk_to_rgb(
                        to_u8(px[0], bpc),
                        to_u8(px[1], bpc),
                        to_u8(px[2], bpc),
                        to_u8(px[3], bpc),
                    )
                })
                .collect();
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, data).ok_or_else(buffer_err)?)
        }
        ColorSpace::Indexed {
            base,
            hival,
            lookup,
        } => {
            let n = base.components();
            let entry = |s: u16| {
                let i = usize::from(s).min(*hival) * n;
                lookup.get(i..i + n).unwrap_or(&NO_ENTRY[..n])
            };
            match base.as_ref() {
                ColorSpace::Gray => {
                    let data = samples.iter().map(|&s| entry(s)[0]).collect();
                    DynamicImage::ImageLuma8(
                        GrayImage::from_raw(width, height, data).ok_or_else(buffer_err)?,
                    )
                }
                ColorSpace::Rgb => {
                    let data = samples.iter().flat_map(|&s| entry(s).to_vec()).collect();
                    DynamicImage::ImageRgb8(
                        RgbImage::from_raw(width, height, data).ok_or_else(buffer_err)?,
                    )
                }
                ColorSpace::Cmyk => {
                    let data = samples
                        .iter()
                        .flat_map(|&s| {
                            let e = entry(s);
                            cmyk_to_rgb(e[0], e[1], e[2], e[3])
                        })
                        .collect();
                    DynamicImage::ImageRgb8(
                        RgbImage::from_raw(width, height, data).ok_or_else(buffer_err)?,
                    )
                }
                ColorSpace::Indexed { .. } => return Err("nested Indexed color space".into()),
            }
        }
    };
    Ok(image)
}

/// Decode an image XObject into pixels and report its source encoding.
pub fn decode_image(doc: &Document, stream: &Stream) -> Result<(DynamicImage, ImageEncoding), String> {
    let dict = &stream.dict;
    let names = filters(doc, dict);

    if let Some((last, earlier)) = names.split_last()
        && matches!(last.as_str(), "DCTDecode" | "DCT")
    {
        let jpeg = decompress(doc, dict, &stream.content, earlier)?;
        let image = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .map_err(|e| format!("JPEG decode failed: {e}"))?;
        return Ok((image, ImageEncoding::Jpeg));
    }

    let width = int(doc, dict, b"Width")
        .filter(|w| *w > 0)
        .ok_or("missing or invalid /Width")?;
    let height = int(doc, dict, b"Height")
        .filter(|h| *h > 0)
        .ok_or("missing or invalid /Height")?;
    let (width, height) = (
        u32::try_from(width).map_err(|_| "image too wide")?,
        u32::try_from(height).map_err(|_| "image too tall")?,
    );

    let is_mask = matches!(
        dict.get(b"ImageMask").ok().and_then(|m| resolve(doc, m)),
        Some(Object::Boolean(true))
    );
    let (space, bpc) = if is_mask {
        (ColorSpace::Gray, 1)
    } else {
        let space = match dict.get(b"ColorSpace").or_else(|_| dict.get(b"CS")) {
            Ok(cs) => parse_color_space(doc, cs)?,
            Err(_) => return Err("image without /ColorSpace".into()),
        };
        let bpc = match int(doc, dict, b"BitsPerComponent").unwrap_or(8) {
            bpc @ (1 | 2 | 4 | 8 | 16) => bpc as usize,
            other => return Err(format!("unsupported bits per component: {other}")),
        };
        (space, bpc)
    };
    if bpc == 16 && matches!(space, ColorSpace::Indexed { .. }) {
        return Err("16-bit Indexed image".into());
    }

    let data = decompress(doc, dict, &stream.content, &names)?;
    let mut samples = read_samples(
        &data,
        width as usize,
        height as usize,
        space.components(),
        bpc,
    )?;

    if space.components() == 1 && !matches!(space, ColorSpace::Indexed { .. }) && inverted(doc, dict) {
        let max = if bpc == 16 { u16::MAX } else { (1u16 << bpc) - 1 };
        for s in &mut samples {
            *s = max - *s;
        }
    }

    let image = raw_image(samples, width, height, &space, bpc)?;
    Ok((image, ImageEncoding::Png))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use image::GenericImageView;
    use lopdf::{StringFormat, dictionary};

    use super::*;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn raw_rgb() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 2, "Height" => 1,
                "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 0, 255],
        );
        let (img, enc) = decode_image(&doc, &stream).unwrap();
        assert_eq!(enc, ImageEncoding::Png);
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn flate_image_xobject_with_indirect_predictor_parms() {
        // two rows of 3 gray pixels, "Up" filter on the second row
        let encoded = [0u8, 10, 20, 30, 2, 1, 1, 1];
        let mut doc = Document::with_version("1.5");
        let parms = doc.add_object(dictionary! { "Predictor" => 15, "Colors" => 1, "Columns" => 3 });
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject", "Subtype" => "Image",
                "Width" => 3, "Height" => 2,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8,
                "Filter" => vec!["Fl".into()],
                "DecodeParms" => vec![parms.into()],
            },
            deflate(&encoded),
        );
        let (img, _) = decode_image(&doc, &stream).unwrap();
        assert_eq!(img.as_bytes(), &[10, 20, 30, 11, 21, 31]);
    }

    #[test]
    fn invalid_bits_per_component_is_an_error() {
        let doc = Document::with_version("1.5");
        for bpc in [0i64, -8, 3, 32] {
            let stream = Stream::new(
                dictionary! {
                    "Width" => 200, "Height" => 200,
                    "ColorSpace" => "DeviceGray", "BitsPerComponent" => bpc,
                },
                vec![0x55; 64],
            );
            let err = decode_image(&doc, &stream).unwrap_err();
            assert!(err.contains("bits per component"), "{bpc}: {err}");
        }
    }

    #[test]
    fn one_bit_mask_and_decode_inversion() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 4, "Height" => 1, "ImageMask" => true,
                "Decode" => vec![1.into(), 0.into()],
            },
            vec![0b1010_0000],
        );
        let (img, _) = decode_image(&doc, &stream).unwrap();
        assert_eq!(img.as_bytes(), &[0, 255, 0, 255]);
    }

    #[test]
    fn indexed_rgb_palette() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 2, "Height" => 1, "BitsPerComponent" => 8,
                "ColorSpace" => vec![
                    "Indexed".into(),
                    "DeviceRGB".into(),
                    1.into(),
                    Object::String(vec![0, 0, 0, 9, 8, 7], StringFormat::Hexadecimal),
                ],
            },
            vec![1, 0],
        );
        let (img, _) = decode_image(&doc, &stream).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.as_bytes(), &[9, 8, 7, 0, 0, 0]);
    }

    #[test]
    fn cmyk_converts_to_rgb() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 1, "Height" => 1,
                "ColorSpace" => "DeviceCMYK", "BitsPerComponent" => 8,
            },
            vec![0, 255, 255, 0],
        );
        let (img, _) = decode_image(&doc, &stream).unwrap();
        assert_eq!(img.as_bytes(), &[255, 0, 0]);
    }

    #[test]
    fn dct_is_reported_as_jpeg() {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([200, 100, 50])))
            .write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 16, "Height" => 8,
                "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        let (img, enc) = decode_image(&doc, &stream).unwrap();
        assert_eq!(enc, ImageEncoding::Jpeg);
        assert_eq!(img.dimensions(), (16, 8));
    }

    #[test]
    fn short_data_and_unknown_filter_fail() {
        let doc = Document::with_version("1.5");
        let short = Stream::new(
            dictionary! {
                "Width" => 10, "Height" => 10,
                "ColorSpace" => "DeviceRGB", "BitsPerComponent" => 8,
            },
            vec![1, 2, 3],
        );
        assert!(decode_image(&doc, &short).unwrap_err().contains("too short"));

        let jbig2 = Stream::new(
            dictionary! {
                "Width" => 1, "Height" => 1,
                "ColorSpace" => "DeviceGray", "BitsPerComponent" => 1,
                "Filter" => "JBIG2Decode",
            },
            vec![0],
        );
        assert!(decode_image(&doc, &jbig2).unwrap_err().contains("JBIG2Decode"));
    }
}
