//! Locating image XObjects in a page's resources.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Follow a reference to the object it points at.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        _ => Some(obj),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Some(Object::Dictionary(d)) => Some(d),
        Some(Object::Stream(s)) => Some(&s.dict),
        _ => None,
    }
}

/// `/Resources` of a page, inherited from the page tree when the page has none.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    let mut visited = HashSet::from([page_id]);

    loop {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent_id = match node.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => return None,
        };
        if !visited.insert(parent_id) {
            return None;
        }
        node = doc.get_dictionary(parent_id).ok()?;
    }
}

fn subtype(dict: &Dictionary) -> Option<&[u8]> {
    match dict.get(b"Subtype") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    }
}

fn collect_from_resources(
    doc: &Document,
    resources: &Dictionary,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve_dict(doc, x))
    else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Object::Reference(id) = value else {
            continue;
        };
        if !seen.insert(*id) {
            continue;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
            continue;
        };

        match subtype(&stream.dict) {
            Some(b"Image") => images.push(*id),
            Some(b"Form") => {
                if let Some(form_resources) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve_dict(doc, r))
                {
                    collect_from_resources(doc, form_resources, images, seen);
                }
            }
            _ => {}
        }
    }
}

/// Image XObjects reachable from a page, in resource order.
///
/// Images drawn through Form XObjects are included. Each image object is
/// listed once per page even if several names point at it.
pub fn page_image_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut images = Vec::new();
    let mut seen = HashSet::new();
    if let Some(resources) = page_resources(doc, page_id) {
        collect_from_resources(doc, resources, &mut images, &mut seen);
    }
    images
}

#[cfg(test)]
mod tests {
    use lopdf::{Stream, dictionary};

    use super::*;

    fn image_stream() -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x80],
        )
    }

    #[test]
    fn finds_inherited_and_nested_images() {
        let mut doc = Document::with_version("1.5");
        let direct = doc.add_object(image_stream());
        let nested = doc.add_object(image_stream());
        let form = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im9" => nested, "Im1" => direct },
                },
            },
            Vec::new(),
        ));

        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im1" => direct, "Fm1" => form, "Im2" => direct },
                },
            }),
        );

        let ids = page_image_ids(&doc, page_id);
        assert_eq!(ids, vec![direct, nested]);
    }

    #[test]
    fn page_without_resources_has_no_images() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        assert!(page_image_ids(&doc, page_id).is_empty());
    }
}
