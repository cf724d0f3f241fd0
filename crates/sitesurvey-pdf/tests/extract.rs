//! End-to-end tests for [`PdfImageBackend`] against small PDFs built with lopdf.

use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use sitesurvey_core::{
    BackendError, DecodeErrorPolicy, ExtractOptions, ImageEncoding, PdfBackend,
    SurveyConfigBuilder, run,
};
use sitesurvey_pdf::PdfImageBackend;

struct PageSpec {
    text: &'static str,
    image: Option<Stream>,
}

fn text_page(text: &'static str) -> PageSpec {
    PageSpec { text, image: None }
}

fn rgb_image(width: u32, height: u32) -> Stream {
    let mut samples = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            samples.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 90]);
        }
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&samples).unwrap();
    let data = encoder.finish().unwrap();

    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        data,
    )
}

fn write_pdf(path: &Path, pages: Vec<PageSpec>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for spec in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(spec.text)]),
            Operation::new("ET", vec![]),
        ];
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if let Some(image) = spec.image {
            let image_id = doc.add_object(image);
            resources.set("XObject", dictionary! { "Im1" => image_id });
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![300.into(), 0.into(), 0.into(), 300.into(), 50.into(), 50.into()],
                ),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ]);
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn survey_pdf(path: &Path) {
    write_pdf(
        path,
        vec![
            PageSpec {
                text: "Cover Tower",
                image: Some(rgb_image(400, 400)),
            },
            text_page("Contents"),
            PageSpec {
                text: "Site ID: 1234",
                image: Some(rgb_image(300, 300)),
            },
            text_page("Notes"),
            text_page("Appendix"),
        ],
    );
}

#[test]
fn extracts_images_after_skipped_pages() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("survey.pdf");
    survey_pdf(&pdf);

    let images = PdfImageBackend::new()
        .extract_images(&pdf, &ExtractOptions::default())
        .unwrap();

    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!(image.page_index, 2);
    assert_eq!(image.image_index, 0);
    assert_eq!(image.encoding, ImageEncoding::Png);
    assert_eq!((image.image.width(), image.image.height()), (300, 300));
    assert!(image.page_text.contains("Site ID"));
}

#[test]
fn zero_skip_pages_includes_cover() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("survey.pdf");
    survey_pdf(&pdf);

    let options = ExtractOptions {
        skip_pages: 0,
        ..ExtractOptions::default()
    };
    let images = PdfImageBackend::new().extract_images(&pdf, &options).unwrap();

    let pages: Vec<usize> = images.iter().map(|i| i.page_index).collect();
    assert_eq!(pages, vec![0, 2]);
    assert!(images[0].page_text.contains("Cover"));
}

#[test]
fn full_run_sorts_and_ranks_the_site_photo() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("survey.pdf");
    survey_pdf(&pdf);
    let output = dir.path().join("output");

    let config = SurveyConfigBuilder::new()
        .pdf_path(&pdf)
        .output_dir(&output)
        .build()
        .unwrap();
    let report = run(&config, &PdfImageBackend::new()).unwrap();

    assert_eq!(report.saved.len(), 1);
    assert!(output.join("Site ID").join("page_3_img_1.png").is_file());

    let top_dir = output.join("high_resolution_images");
    assert_eq!(std::fs::read_dir(&top_dir).unwrap().count(), 1);
    assert!(top_dir.join("high_res_image_1.png").is_file());
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = PdfImageBackend::new()
        .extract_images(&dir.path().join("absent.pdf"), &ExtractOptions::default());

    assert!(matches!(result, Err(BackendError::OpenError(_))));
}

#[test]
fn undecodable_image_fails_or_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("broken.pdf");

    let mut broken = rgb_image(200, 200);
    broken.dict.set("Filter", "JBIG2Decode");
    write_pdf(
        &pdf,
        vec![
            text_page("Cover"),
            text_page("Contents"),
            PageSpec {
                text: "Shelter",
                image: Some(broken),
            },
            PageSpec {
                text: "Cabinets",
                image: Some(rgb_image(150, 150)),
            },
        ],
    );

    let backend = PdfImageBackend::new();
    match backend.extract_images(&pdf, &ExtractOptions::default()) {
        Err(BackendError::DecodeError { page, index, .. }) => {
            assert_eq!((page, index), (2, 0));
        }
        other => panic!("expected a decode error, got {other:?}"),
    }

    let options = ExtractOptions {
        on_decode_error: DecodeErrorPolicy::Skip,
        ..ExtractOptions::default()
    };
    let images = backend.extract_images(&pdf, &options).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].page_index, 3);
    assert!(images[0].page_text.contains("Cabinets"));
}

#[test]
fn zero_bits_per_component_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("zero_bpc.pdf");

    let mut malformed = rgb_image(200, 200);
    malformed.dict.set("BitsPerComponent", 0);
    write_pdf(
        &pdf,
        vec![
            text_page("Cover"),
            text_page("Contents"),
            PageSpec {
                text: "Obstacles",
                image: Some(malformed),
            },
        ],
    );

    let options = ExtractOptions {
        on_decode_error: DecodeErrorPolicy::Skip,
        ..ExtractOptions::default()
    };
    let images = PdfImageBackend::new().extract_images(&pdf, &options).unwrap();
    assert!(images.is_empty());

    let result = PdfImageBackend::new().extract_images(&pdf, &ExtractOptions::default());
    assert!(matches!(result, Err(BackendError::DecodeError { page: 2, index: 0, .. })));
}
